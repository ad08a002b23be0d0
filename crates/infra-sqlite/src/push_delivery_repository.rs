// SQLite PushDeliveryRepository Implementation (outbox)

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use medtrack_core::domain::{DeliveryId, DeliveryState, PushDelivery};
use medtrack_core::error::{AppError, Result};
use medtrack_core::port::PushDeliveryRepository;
use sqlx::SqlitePool;

pub struct SqlitePushDeliveryRepository {
    pool: SqlitePool,
}

impl SqlitePushDeliveryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PushDeliveryRepository for SqlitePushDeliveryRepository {
    async fn enqueue(&self, delivery: &PushDelivery) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO push_deliveries (
                id, user_id, medication_id, device_token, dedup_key,
                title, body, data, state,
                attempts, max_attempts, retry_delay_ms, next_attempt_at, last_error,
                created_at, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (dedup_key) DO NOTHING
            "#,
        )
        .bind(&delivery.id)
        .bind(delivery.user_id)
        .bind(delivery.medication_id)
        .bind(&delivery.device_token)
        .bind(&delivery.dedup_key)
        .bind(&delivery.title)
        .bind(&delivery.body)
        .bind(delivery.data.to_string())
        .bind(delivery.state.to_string())
        .bind(delivery.attempts)
        .bind(delivery.max_attempts)
        .bind(delivery.retry_delay_ms)
        .bind(delivery.next_attempt_at)
        .bind(&delivery.last_error)
        .bind(delivery.created_at)
        .bind(delivery.started_at)
        .bind(delivery.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: &DeliveryId) -> Result<Option<PushDelivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>("SELECT * FROM push_deliveries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_delivery()))
    }

    async fn update(&self, delivery: &PushDelivery) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE push_deliveries
            SET state = ?, attempts = ?, next_attempt_at = ?, last_error = ?,
                started_at = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(delivery.state.to_string())
        .bind(delivery.attempts)
        .bind(delivery.next_attempt_at)
        .bind(&delivery.last_error)
        .bind(delivery.started_at)
        .bind(delivery.finished_at)
        .bind(&delivery.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // The row may be gone if its medication was deleted mid-send
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Delivery {} not found", delivery.id)));
        }
        Ok(())
    }

    async fn pop_due(&self, now_millis: i64) -> Result<Option<PushDelivery>> {
        let state_sending = DeliveryState::Sending.to_string();
        let state_queued = DeliveryState::Queued.to_string();

        // Claim and count the attempt in one statement
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            UPDATE push_deliveries
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT d.id FROM push_deliveries d
                WHERE d.state = ? AND d.next_attempt_at <= ?
                ORDER BY d.next_attempt_at ASC, d.created_at ASC, d.id ASC
                LIMIT 1
            )
            AND state = ?
            RETURNING *
            "#,
        )
        .bind(&state_sending)
        .bind(now_millis)
        .bind(&state_queued)
        .bind(now_millis)
        .bind(&state_queued)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_delivery()))
    }

    async fn count_by_state(&self, state: DeliveryState) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM push_deliveries WHERE state = ?")
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn find_by_state(&self, state: DeliveryState) -> Result<Vec<PushDelivery>> {
        let rows: Vec<DeliveryRow> = sqlx::query_as(
            r#"
            SELECT * FROM push_deliveries
            WHERE state = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|row| row.into_delivery()).collect())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: String,
    user_id: i64,
    medication_id: Option<i64>,
    device_token: String,
    dedup_key: String,
    title: String,
    body: String,
    data: String,
    state: String,
    attempts: i32,
    max_attempts: i32,
    retry_delay_ms: i64,
    next_attempt_at: i64,
    last_error: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
}

impl DeliveryRow {
    fn into_delivery(self) -> PushDelivery {
        let state = self.state.parse().unwrap_or(DeliveryState::Failed);
        let data = serde_json::from_str(&self.data).unwrap_or(serde_json::json!({}));

        PushDelivery {
            id: self.id,
            user_id: self.user_id,
            medication_id: self.medication_id,
            device_token: self.device_token,
            dedup_key: self.dedup_key,
            title: self.title,
            body: self.body,
            data,
            state,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            retry_delay_ms: self.retry_delay_ms,
            next_attempt_at: self.next_attempt_at,
            last_error: self.last_error,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication_repository::tests::setup_with_user;
    use serde_json::json;

    async fn setup() -> (SqlitePushDeliveryRepository, i64) {
        let (pool, user_id) = setup_with_user().await;
        (SqlitePushDeliveryRepository::new(pool), user_id)
    }

    fn delivery(id: &str, user_id: i64, key: &str, created_at: i64) -> PushDelivery {
        PushDelivery::new(
            id,
            created_at,
            user_id,
            "tok",
            key,
            "Refill reminder",
            "You'll run out of Metformin in 2 days.",
            json!({"type": "refill_alert", "medication_id": "7"}),
        )
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates() {
        let (repo, user) = setup().await;

        assert!(repo.enqueue(&delivery("d1", user, "k", 0)).await.unwrap());
        assert!(!repo.enqueue(&delivery("d2", user, "k", 0)).await.unwrap());
        assert_eq!(repo.count_by_state(DeliveryState::Queued).await.unwrap(), 1);

        let stored = repo.find_by_id(&"d1".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.data["medication_id"], "7");
        assert_eq!(stored.max_attempts, 4);
    }

    #[tokio::test]
    async fn test_pop_due_claims_oldest_due() {
        let (repo, user) = setup().await;
        repo.enqueue(&delivery("late", user, "k1", 20)).await.unwrap();
        repo.enqueue(&delivery("early", user, "k2", 10)).await.unwrap();
        repo.enqueue(&delivery("future", user, "k3", 1_000)).await.unwrap();

        let first = repo.pop_due(100).await.unwrap().unwrap();
        assert_eq!(first.id, "early");
        assert_eq!(first.state, DeliveryState::Sending);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.started_at, Some(100));

        assert_eq!(repo.pop_due(100).await.unwrap().unwrap().id, "late");
        assert!(repo.pop_due(100).await.unwrap().is_none());
        assert_eq!(repo.pop_due(1_000).await.unwrap().unwrap().id, "future");
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let (repo, user) = setup().await;
        repo.enqueue(&delivery("d1", user, "k", 0)).await.unwrap();

        let mut d = repo.pop_due(0).await.unwrap().unwrap();
        d.requeue(30_000, Some("HTTP 503".to_string()));
        repo.update(&d).await.unwrap();

        let stored = repo.find_by_id(&d.id).await.unwrap().unwrap();
        assert_eq!(stored.state, DeliveryState::Queued);
        assert_eq!(stored.next_attempt_at, 30_000);
        assert_eq!(stored.last_error.as_deref(), Some("HTTP 503"));
        assert!(repo.pop_due(29_999).await.unwrap().is_none());

        let retried = repo.pop_due(30_000).await.unwrap().unwrap();
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn test_find_by_state() {
        let (repo, user) = setup().await;
        repo.enqueue(&delivery("d1", user, "k1", 0)).await.unwrap();
        repo.enqueue(&delivery("d2", user, "k2", 0)).await.unwrap();
        let mut d = repo.pop_due(0).await.unwrap().unwrap();
        d.mark_sent(5).unwrap();
        repo.update(&d).await.unwrap();

        let sent = repo.find_by_state(DeliveryState::Sent).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].finished_at, Some(5));
        assert_eq!(repo.find_by_state(DeliveryState::Queued).await.unwrap().len(), 1);
    }
}
