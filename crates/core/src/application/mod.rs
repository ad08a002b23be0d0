// Application Layer - Use Cases and Business Logic

pub mod account;
pub mod insights;
pub mod maintenance;
pub mod medication;
pub mod recovery;
pub mod refill_alert;
pub mod retry;
pub mod tracking;
pub mod worker;

// Re-exports
pub use account::{AccountService, Registration};
pub use insights::InsightsService;
pub use maintenance::MaintenanceScheduler;
pub use medication::{MedicationDraft, MedicationService};
pub use recovery::RecoveryService;
pub use refill_alert::{AlertSettings, RefillAlertScanner, RefillAlertScheduler, ScanReport};
pub use retry::{RetryDecision, RetryPolicy};
pub use tracking::{SideEffectDraft, TrackingService};
pub use worker::{shutdown_channel, PushWorker, ShutdownSender, ShutdownToken};
