// Domain Layer - Pure business logic and entities

pub mod adherence;
pub mod device;
pub mod error;
pub mod insights;
pub mod medication;
pub mod push;
pub mod refill;
pub mod side_effect;
pub mod user;

// Re-exports
pub use adherence::{AdherenceLog, AdherenceLogId, DoseStatus, NewAdherenceLog};
pub use device::{DeviceToken, TokenRegistration};
pub use error::DomainError;
pub use insights::{adherence_score, Insights, MissedDoseReason, StreakCounter, SymptomTrend};
pub use medication::{Medication, MedicationId, MedicationUpdate, NewMedication, RefillEstimate};
pub use push::{DeliveryId, DeliveryState, PushDelivery, PushMessage};
pub use refill::{NewRefillLog, RefillLog};
pub use side_effect::{NewSideEffectLog, SideEffectLog};
pub use user::{NewUser, ProfileUpdate, User, UserId};
