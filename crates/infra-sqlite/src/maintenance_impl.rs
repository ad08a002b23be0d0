// Outbox GC and VACUUM over SQLite

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use medtrack_core::domain::DeliveryState;
use medtrack_core::error::Result;
use medtrack_core::port::time_provider::DAY_MILLIS;
use medtrack_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn db_size_bytes(&self) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        let before = self.db_size_bytes().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let after = self.db_size_bytes().await?;
        let reclaimed_mb = (before - after).max(0) as f64 / BYTES_PER_MB;

        info!(
            size_before_mb = before as f64 / BYTES_PER_MB,
            size_after_mb = after as f64 / BYTES_PER_MB,
            reclaimed_mb,
            "VACUUM completed"
        );
        Ok(reclaimed_mb)
    }

    /// Only SENT and FAILED rows are eligible; `retention_days <= 0` keeps everything
    async fn gc_finished_deliveries(&self, retention_days: i64) -> Result<i64> {
        if retention_days <= 0 {
            debug!("Delivery GC disabled");
            return Ok(0);
        }
        let cutoff = self.time_provider.now_millis() - retention_days * DAY_MILLIS;

        let deleted = sqlx::query(
            r#"
            DELETE FROM push_deliveries
            WHERE state IN (?, ?)
              AND finished_at IS NOT NULL
              AND finished_at < ?
            "#,
        )
        .bind(DeliveryState::Sent.to_string())
        .bind(DeliveryState::Failed.to_string())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected() as i64;

        info!(retention_days, cutoff, deleted, "Finished deliveries collected");
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.db_size_bytes().await?;

        let by_state: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM push_deliveries GROUP BY state")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let finished = [DeliveryState::Sent.to_string(), DeliveryState::Failed.to_string()];
        let delivery_count = by_state.iter().map(|(_, n)| n).sum();
        let finished_delivery_count = by_state
            .iter()
            .filter(|(state, _)| finished.contains(state))
            .map(|(_, n)| n)
            .sum();

        Ok(MaintenanceStats {
            db_size_mb: db_size_bytes as f64 / BYTES_PER_MB,
            db_size_bytes,
            delivery_count,
            finished_delivery_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication_repository::tests::setup_with_user;
    use crate::SqlitePushDeliveryRepository;
    use medtrack_core::domain::PushDelivery;
    use medtrack_core::port::time_provider::mocks::FixedTimeProvider;
    use medtrack_core::port::PushDeliveryRepository;

    const NOW: i64 = 1_711_670_400_000;

    #[tokio::test]
    async fn test_maintenance_stats() {
        let (pool, _) = setup_with_user().await;
        let maintenance = SqliteMaintenance::new(pool, Arc::new(FixedTimeProvider::new(NOW)));

        let stats = maintenance.get_stats().await.unwrap();

        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.delivery_count, 0);
        assert_eq!(stats.finished_delivery_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let (pool, _) = setup_with_user().await;
        let maintenance = SqliteMaintenance::new(pool, Arc::new(FixedTimeProvider::new(NOW)));

        let reclaimed = maintenance.vacuum().await.unwrap();
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_gc_finished_deliveries() {
        let (pool, user) = setup_with_user().await;
        let repo = SqlitePushDeliveryRepository::new(pool.clone());
        let maintenance = SqliteMaintenance::new(pool, Arc::new(FixedTimeProvider::new(NOW)));

        let ten_days_ago = NOW - 10 * DAY_MILLIS;
        let one_day_ago = NOW - DAY_MILLIS;
        for (id, finished_at, state) in [
            ("old-sent", ten_days_ago, DeliveryState::Sent),
            ("old-failed", ten_days_ago, DeliveryState::Failed),
            ("recent", one_day_ago, DeliveryState::Sent),
        ] {
            let mut d = PushDelivery::new(id, 0, user, "tok", id, "t", "b", serde_json::json!({}));
            d.state = state;
            d.finished_at = Some(finished_at);
            repo.enqueue(&d).await.unwrap();
        }
        let queued = PushDelivery::new("queued", 0, user, "tok", "queued", "t", "b", serde_json::json!({}));
        repo.enqueue(&queued).await.unwrap();

        let deleted = maintenance.gc_finished_deliveries(7).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(repo.find_by_id(&"old-sent".to_string()).await.unwrap().is_none());
        assert!(repo.find_by_id(&"recent".to_string()).await.unwrap().is_some());
        assert!(repo.find_by_id(&"queued".to_string()).await.unwrap().is_some());

        let stats = maintenance.get_stats().await.unwrap();
        assert_eq!(stats.delivery_count, 2);
        assert_eq!(stats.finished_delivery_count, 1);
    }

    #[tokio::test]
    async fn test_gc_disabled_with_zero_retention() {
        let (pool, user) = setup_with_user().await;
        let repo = SqlitePushDeliveryRepository::new(pool.clone());
        let maintenance = SqliteMaintenance::new(pool, Arc::new(FixedTimeProvider::new(NOW)));

        let mut d = PushDelivery::new("old", 0, user, "tok", "old", "t", "b", serde_json::json!({}));
        d.state = DeliveryState::Sent;
        d.finished_at = Some(NOW - 30 * DAY_MILLIS);
        repo.enqueue(&d).await.unwrap();

        assert_eq!(maintenance.gc_finished_deliveries(0).await.unwrap(), 0);
        assert_eq!(maintenance.get_stats().await.unwrap().finished_delivery_count, 1);
    }
}
