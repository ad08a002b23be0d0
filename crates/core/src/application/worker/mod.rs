// Push worker - outbox delivery loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::recovery::RecoveryService;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::PushDelivery;
use crate::error::Result;
use crate::port::{DeviceTokenRepository, PushDeliveryRepository, PushError, PushGateway, TimeProvider};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker drains due deliveries from the outbox and hands them to the gateway
pub struct PushWorker {
    deliveries: Arc<dyn PushDeliveryRepository>,
    devices: Arc<dyn DeviceTokenRepository>,
    gateway: Arc<dyn PushGateway>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
    batch_size: usize,
    idle_sleep: std::time::Duration,
    recovery: Option<OrphanSweep>,
}

/// Periodic requeue of deliveries stuck in SENDING
struct OrphanSweep {
    service: Arc<RecoveryService>,
    interval_ms: i64,
    last_run_at: AtomicI64,
}

impl PushWorker {
    pub fn new(
        deliveries: Arc<dyn PushDeliveryRepository>,
        devices: Arc<dyn DeviceTokenRepository>,
        gateway: Arc<dyn PushGateway>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            deliveries,
            devices,
            gateway,
            retry_policy,
            time_provider,
            batch_size: DEFAULT_BATCH_SIZE,
            idle_sleep: IDLE_SLEEP_DURATION,
            recovery: None,
        }
    }

    /// Max deliveries per poll before sleeping
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: std::time::Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Sweep orphaned SENDING deliveries before a batch, at most once per `interval`
    ///
    /// Only safe with a single worker per outbox: a batch never starts while
    /// this worker still holds a delivery in SENDING.
    pub fn with_recovery(
        mut self,
        service: Arc<RecoveryService>,
        interval: std::time::Duration,
    ) -> Self {
        self.recovery = Some(OrphanSweep {
            service,
            interval_ms: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
            last_run_at: AtomicI64::new(i64::MIN),
        });
        self
    }

    async fn sweep_orphans_if_due(&self) -> Result<()> {
        let Some(sweep) = &self.recovery else {
            return Ok(());
        };
        let now = self.time_provider.now_millis();
        let last = sweep.last_run_at.load(Ordering::Relaxed);
        if last != i64::MIN && now.saturating_sub(last) < sweep.interval_ms {
            return Ok(());
        }
        sweep.last_run_at.store(now, Ordering::Relaxed);

        let recovered = sweep.service.recover_orphaned_deliveries().await?;
        if recovered > 0 {
            warn!(recovered, "Requeued orphaned deliveries");
        }
        Ok(())
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(batch_size = self.batch_size, "Push worker started");
        loop {
            if shutdown.is_shutdown() {
                info!("Push worker shutting down");
                break;
            }
            match self.process_batch().await {
                Ok(_) => {
                    // Batch drained or capped: either way yield before polling again
                    tokio::select! {
                        _ = sleep(self.idle_sleep) => {},
                        _ = shutdown.wait() => {
                            info!("Push worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Push worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Push worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Push worker stopped");
        Ok(())
    }

    /// Send up to `batch_size` due deliveries; returns how many were processed
    pub async fn process_batch(&self) -> Result<usize> {
        self.sweep_orphans_if_due().await?;

        let mut processed = 0;
        while processed < self.batch_size {
            if !self.process_next_delivery().await? {
                break;
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// Process next due delivery (returns true if one was processed)
    pub async fn process_next_delivery(&self) -> Result<bool> {
        let now = self.time_provider.now_millis();

        // Already SENDING with the attempt counted
        let mut delivery = match self.deliveries.pop_due(now).await? {
            Some(d) => d,
            None => return Ok(false),
        };

        info!(
            delivery_id = %delivery.id,
            attempt = delivery.attempts,
            max_attempts = delivery.max_attempts,
            "Sending push"
        );

        // Gateway call runs in its own task so a panic cannot take the worker down
        let gateway = Arc::clone(&self.gateway);
        let message = delivery.message();
        let handle = tokio::task::spawn(async move { gateway.send(&message).await });

        match handle.await {
            Ok(Ok(receipt)) => {
                let now = self.time_provider.now_millis();
                delivery.mark_sent(now)?;
                self.deliveries.update(&delivery).await?;
                info!(
                    delivery_id = %delivery.id,
                    message_id = ?receipt.message_id,
                    "Push delivered"
                );
            }
            Ok(Err(push_err)) => self.handle_failure(&mut delivery, push_err).await?,
            Err(join_err) => {
                // Panicked or cancelled (non-retryable)
                if join_err.is_panic() {
                    error!(delivery_id = %delivery.id, "Push send panicked: {:?}", join_err);
                } else {
                    error!(delivery_id = %delivery.id, "Push send cancelled: {:?}", join_err);
                }
                let now = self.time_provider.now_millis();
                delivery.fail(now, "gateway task panicked or was cancelled");
                self.deliveries.update(&delivery).await?;
            }
        }
        Ok(true)
    }

    async fn handle_failure(&self, delivery: &mut PushDelivery, err: PushError) -> Result<()> {
        if let PushError::InvalidToken(reason) = &err {
            let removed = self.devices.remove(&delivery.device_token).await?;
            warn!(
                delivery_id = %delivery.id,
                reason = %reason,
                token_removed = removed,
                "Device token rejected by gateway"
            );
        }

        match self.retry_policy.should_retry(delivery, &err) {
            RetryDecision::Retry(delay_ms) => {
                self.retry_policy.prepare_for_retry(delivery, delay_ms, &err);
            }
            RetryDecision::Failed => {
                error!(
                    delivery_id = %delivery.id,
                    attempts = delivery.attempts,
                    error = %err,
                    "Push delivery failed"
                );
                delivery.fail(self.time_provider.now_millis(), err.to_string());
            }
        }
        self.deliveries.update(delivery).await
    }
}
