// Push Delivery Repository Port (Interface)

use crate::domain::{DeliveryId, DeliveryState, PushDelivery};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for the push outbox
#[async_trait]
pub trait PushDeliveryRepository: Send + Sync {
    /// Insert a delivery unless its dedup key already exists
    ///
    /// Returns false when the key was taken (nothing inserted).
    async fn enqueue(&self, delivery: &PushDelivery) -> Result<bool>;

    async fn find_by_id(&self, id: &DeliveryId) -> Result<Option<PushDelivery>>;

    async fn update(&self, delivery: &PushDelivery) -> Result<()>;

    /// Atomically claim the oldest QUEUED delivery due at `now_millis`
    ///
    /// The returned delivery is already SENDING with its attempt counted.
    async fn pop_due(&self, now_millis: i64) -> Result<Option<PushDelivery>>;

    async fn count_by_state(&self, state: DeliveryState) -> Result<i64>;

    async fn find_by_state(&self, state: DeliveryState) -> Result<Vec<PushDelivery>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory outbox
    #[derive(Default)]
    pub struct InMemoryPushDeliveryRepository {
        rows: Mutex<Vec<PushDelivery>>,
    }

    impl InMemoryPushDeliveryRepository {
        pub fn all(&self) -> Vec<PushDelivery> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushDeliveryRepository for InMemoryPushDeliveryRepository {
        async fn enqueue(&self, delivery: &PushDelivery) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|d| d.dedup_key == delivery.dedup_key) {
                return Ok(false);
            }
            rows.push(delivery.clone());
            Ok(true)
        }

        async fn find_by_id(&self, id: &DeliveryId) -> Result<Option<PushDelivery>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|d| &d.id == id).cloned())
        }

        async fn update(&self, delivery: &PushDelivery) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|d| d.id == delivery.id) {
                Some(slot) => {
                    *slot = delivery.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("delivery {}", delivery.id))),
            }
        }

        async fn pop_due(&self, now_millis: i64) -> Result<Option<PushDelivery>> {
            let mut rows = self.rows.lock().unwrap();
            let next = rows
                .iter_mut()
                .filter(|d| d.state == DeliveryState::Queued && d.next_attempt_at <= now_millis)
                .min_by_key(|d| (d.next_attempt_at, d.created_at));
            match next {
                Some(delivery) => {
                    delivery.start(now_millis)?;
                    Ok(Some(delivery.clone()))
                }
                None => Ok(None),
            }
        }

        async fn count_by_state(&self, state: DeliveryState) -> Result<i64> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|d| d.state == state).count() as i64)
        }

        async fn find_by_state(&self, state: DeliveryState) -> Result<Vec<PushDelivery>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|d| d.state == state).cloned().collect())
        }
    }
}
