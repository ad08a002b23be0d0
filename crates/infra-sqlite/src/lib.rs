// MedTrack Infrastructure - SQLite Adapter
// Implements: repository ports, Maintenance

mod connection;
mod device_token_repository;
mod error;
mod maintenance_impl;
mod medication_repository;
mod migration;
mod push_delivery_repository;
mod tracking_repository;
mod user_repository;

pub use connection::create_pool;
pub use device_token_repository::SqliteDeviceTokenRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use medication_repository::SqliteMedicationRepository;
pub use migration::run_migrations;
pub use push_delivery_repository::SqlitePushDeliveryRepository;
pub use tracking_repository::{
    SqliteAdherenceRepository, SqliteRefillRepository, SqliteSideEffectRepository,
};
pub use user_repository::SqliteUserRepository;

pub use sqlx::SqlitePool;

