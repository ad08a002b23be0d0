// Port Layer - Interfaces for external dependencies

pub mod device_token_repository;
pub mod id_provider; // For deterministic testing
pub mod maintenance;
pub mod medication_repository;
pub mod password_hasher;
pub mod push_delivery_repository;
pub mod push_gateway;
pub mod time_provider;
pub mod tracking_repository;
pub mod user_repository;

// Re-exports
pub use device_token_repository::DeviceTokenRepository;
pub use id_provider::IdProvider;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use medication_repository::MedicationRepository;
pub use password_hasher::PasswordHasher;
pub use push_delivery_repository::PushDeliveryRepository;
pub use push_gateway::{PushError, PushGateway, PushReceipt};
pub use time_provider::TimeProvider;
pub use tracking_repository::{AdherenceRepository, RefillRepository, SideEffectRepository};
pub use user_repository::UserRepository;
