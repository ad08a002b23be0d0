// Crash recovery for the push outbox
use crate::domain::DeliveryState;
use crate::port::{PushDeliveryRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Crash recovery service
///
/// Detects deliveries left SENDING by a stopped process. Runs at startup and,
/// through `PushWorker::with_recovery`, periodically while the worker polls.
pub struct RecoveryService {
    deliveries: Arc<dyn PushDeliveryRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `deliveries` - Outbox repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        deliveries: Arc<dyn PushDeliveryRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            deliveries,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover orphaned deliveries
    ///
    /// 1. Find SENDING deliveries with `started_at < now - recovery_window`
    /// 2. Requeue them, due now, if attempts remain
    /// 3. Otherwise (or without `started_at`) mark them FAILED
    ///
    /// The interrupted attempt stays counted, so a delivery is never sent more
    /// than `max_attempts` times.
    ///
    /// # Returns
    /// Number of deliveries recovered
    pub async fn recover_orphaned_deliveries(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned delivery recovery"
        );

        let sending = self.deliveries.find_by_state(DeliveryState::Sending).await?;
        let mut recovered_count = 0;

        for mut delivery in sending {
            match delivery.started_at {
                Some(started_at) if started_at >= cutoff => continue,
                Some(started_at) if delivery.has_attempts_left() => {
                    info!(
                        delivery_id = %delivery.id,
                        started_at = %started_at,
                        attempts = delivery.attempts,
                        "Requeueing orphaned delivery"
                    );
                    delivery.requeue(now, Some("interrupted by daemon restart".to_string()));
                }
                Some(_) => {
                    warn!(
                        delivery_id = %delivery.id,
                        "Orphaned delivery has no attempts left, marking as FAILED"
                    );
                    delivery.fail(now, "interrupted by daemon restart");
                }
                None => {
                    warn!(
                        delivery_id = %delivery.id,
                        "SENDING delivery without started_at, marking as FAILED"
                    );
                    delivery.fail(now, "inconsistent state");
                }
            }

            self.deliveries.update(&delivery).await?;
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned delivery recovery complete");
        Ok(recovered_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PushDelivery;
    use crate::port::push_delivery_repository::mocks::InMemoryPushDeliveryRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use serde_json::json;

    const NOW: i64 = 1_711_670_400_000;

    fn sending(id: &str, started_at: i64, attempts: i32) -> PushDelivery {
        let mut d = PushDelivery::new(id, 0, 1, "tok", id, "t", "b", json!({}));
        d.state = DeliveryState::Sending;
        d.started_at = Some(started_at);
        d.attempts = attempts;
        d
    }

    #[tokio::test]
    async fn test_requeues_stale_and_keeps_fresh() {
        let repo = Arc::new(InMemoryPushDeliveryRepository::default());
        repo.enqueue(&sending("stale", NOW - 10 * 60 * 1000, 1)).await.unwrap();
        repo.enqueue(&sending("fresh", NOW - 1000, 1)).await.unwrap();
        repo.enqueue(&sending("spent", NOW - 10 * 60 * 1000, 4)).await.unwrap();

        let svc = RecoveryService::new(repo.clone(), Arc::new(FixedTimeProvider::new(NOW)), None);
        assert_eq!(svc.recover_orphaned_deliveries().await.unwrap(), 2);

        let stale = repo.find_by_id(&"stale".to_string()).await.unwrap().unwrap();
        assert_eq!(stale.state, DeliveryState::Queued);
        assert_eq!(stale.next_attempt_at, NOW);
        assert_eq!(stale.attempts, 1);

        let fresh = repo.find_by_id(&"fresh".to_string()).await.unwrap().unwrap();
        assert_eq!(fresh.state, DeliveryState::Sending);

        let spent = repo.find_by_id(&"spent".to_string()).await.unwrap().unwrap();
        assert_eq!(spent.state, DeliveryState::Failed);
    }
}
