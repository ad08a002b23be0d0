// Storage housekeeping port

use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceStats {
    pub db_size_mb: f64,
    pub db_size_bytes: i64,
    /// Outbox rows in any state
    pub delivery_count: i64,
    /// Outbox rows in SENT or FAILED
    pub finished_delivery_count: i64,
}

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// How long SENT/FAILED outbox rows are kept, in days
    pub finished_delivery_retention_days: i64,
    /// VACUUM once the file grows past this
    pub max_db_size_mb: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            finished_delivery_retention_days: 7,
            max_db_size_mb: 1000.0,
        }
    }
}

#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Compact the store; returns MB reclaimed
    async fn vacuum(&self) -> Result<f64>;

    /// Drop finished deliveries older than the retention window; returns rows removed
    async fn gc_finished_deliveries(&self, retention_days: i64) -> Result<i64>;

    async fn get_stats(&self) -> Result<MaintenanceStats>;

    /// GC, then VACUUM if the store was over its size limit
    async fn run_full_maintenance(&self, config: &MaintenanceConfig) -> Result<MaintenanceStats> {
        let oversized = self.get_stats().await?.db_size_mb > config.max_db_size_mb;

        let deleted = self
            .gc_finished_deliveries(config.finished_delivery_retention_days)
            .await?;
        let reclaimed_mb = if oversized { self.vacuum().await? } else { 0.0 };

        let stats = self.get_stats().await?;
        tracing::info!(
            deleted_deliveries = deleted,
            reclaimed_mb,
            db_size_mb = stats.db_size_mb,
            "Maintenance completed"
        );
        Ok(stats)
    }
}
