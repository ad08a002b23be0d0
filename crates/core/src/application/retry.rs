// Retry logic for push deliveries
use crate::domain::PushDelivery;
use crate::port::{PushError, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the delivery (with delay in ms)
    Retry(i64),
    /// Do not retry, delivery has failed permanently
    Failed,
}

/// Retry policy
///
/// Determines if a delivery should be retried based on:
/// - The error kind (invalid tokens are never retried)
/// - Attempts made so far vs. the delivery's budget
/// - The delivery's retry delay and the policy's backoff factor
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for current time
    /// * `backoff_factor` - Multiplier per extra attempt (1.0 = fixed delay)
    pub fn new(time_provider: Arc<dyn TimeProvider>, backoff_factor: f64) -> Self {
        Self {
            time_provider,
            backoff_factor,
        }
    }

    /// Determine if a delivery should be retried
    ///
    /// `delivery.attempts` already counts the attempt that just failed.
    ///
    /// Delay formula:
    /// delay = retry_delay_ms * (backoff_factor ^ (attempts - 1))
    pub fn should_retry(&self, delivery: &PushDelivery, error: &PushError) -> RetryDecision {
        if !error.is_retryable() {
            warn!(
                delivery_id = %delivery.id,
                error = %error,
                "Non-retryable push error"
            );
            return RetryDecision::Failed;
        }

        if !delivery.has_attempts_left() {
            warn!(
                delivery_id = %delivery.id,
                attempts = %delivery.attempts,
                max_attempts = %delivery.max_attempts,
                "Max delivery attempts reached"
            );
            return RetryDecision::Failed;
        }

        let exponent = (delivery.attempts - 1).max(0);
        let delay_ms =
            (delivery.retry_delay_ms as f64 * self.backoff_factor.powi(exponent)) as i64;

        info!(
            delivery_id = %delivery.id,
            attempt = %delivery.attempts,
            max_attempts = %delivery.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Prepare a delivery for retry
    ///
    /// Puts it back in the queue, due after `delay_ms`
    pub fn prepare_for_retry(&self, delivery: &mut PushDelivery, delay_ms: i64, error: &PushError) {
        let now = self.time_provider.now_millis();
        delivery.requeue(now + delay_ms, Some(error.to_string()));

        info!(
            delivery_id = %delivery.id,
            attempt = %delivery.attempts,
            next_attempt_at = %delivery.next_attempt_at,
            "Delivery prepared for retry"
        );
    }
}
