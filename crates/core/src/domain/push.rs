// Push Delivery Domain Model (refill-alert outbox)

use crate::domain::error::{DomainError, Result};
use crate::domain::{MedicationId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Delivery ID (UUID v4)
pub type DeliveryId = String;

/// Delivery State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Queued,
    Sending,
    Sent,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Sent | DeliveryState::Failed)
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Queued => write!(f, "QUEUED"),
            DeliveryState::Sending => write!(f, "SENDING"),
            DeliveryState::Sent => write!(f, "SENT"),
            DeliveryState::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for DeliveryState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(DeliveryState::Queued),
            "SENDING" => Ok(DeliveryState::Sending),
            "SENT" => Ok(DeliveryState::Sent),
            "FAILED" => Ok(DeliveryState::Failed),
            other => Err(DomainError::Internal(format!(
                "unknown delivery state: {}",
                other
            ))),
        }
    }
}

/// Notification as handed to the push gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Outbox entry for one notification to one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushDelivery {
    pub id: DeliveryId,
    pub user_id: UserId,
    pub medication_id: Option<MedicationId>,
    pub device_token: String,

    /// At most one delivery per key ever exists
    pub dedup_key: String,

    pub title: String,
    pub body: String,
    pub data: serde_json::Value,

    pub state: DeliveryState,

    // Retry
    pub attempts: i32,
    pub max_attempts: i32,
    pub retry_delay_ms: i64,
    pub next_attempt_at: i64, // epoch ms
    pub last_error: Option<String>,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl PushDelivery {
    /// Create a queued delivery, due immediately
    ///
    /// # Arguments
    ///
    /// * `id` - Unique delivery ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `user_id` - Owner of the device token
    /// * `device_token` - FCM token to address
    /// * `dedup_key` - De-duplication key
    /// * `title`, `body`, `data` - Notification content
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        user_id: UserId,
        device_token: impl Into<String>,
        dedup_key: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            user_id,
            medication_id: None,
            device_token: device_token.into(),
            dedup_key: dedup_key.into(),
            title: title.into(),
            body: body.into(),
            data,
            state: DeliveryState::Queued,
            attempts: 0,
            max_attempts: 4, // initial attempt + 3 retries
            retry_delay_ms: 30_000,
            next_attempt_at: created_at,
            last_error: None,
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Gateway-facing view of this delivery
    pub fn message(&self) -> PushMessage {
        PushMessage {
            to: self.device_token.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            data: self.data.clone(),
        }
    }

    /// Transition to Sending and count the attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != DeliveryState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: DeliveryState::Sending.to_string(),
            });
        }
        self.state = DeliveryState::Sending;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// Transition to Sent
    pub fn mark_sent(&mut self, now_millis: i64) -> Result<()> {
        if self.state != DeliveryState::Sending {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: DeliveryState::Sent.to_string(),
            });
        }
        self.state = DeliveryState::Sent;
        self.finished_at = Some(now_millis);
        self.last_error = None;
        Ok(())
    }

    /// Mark as Failed (terminal)
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = DeliveryState::Failed;
        self.finished_at = Some(now_millis);
        self.last_error = Some(error.into());
    }

    /// Put back in the queue, due at `next_attempt_at`
    pub fn requeue(&mut self, next_attempt_at: i64, error: Option<String>) {
        self.state = DeliveryState::Queued;
        self.started_at = None;
        self.next_attempt_at = next_attempt_at;
        if error.is_some() {
            self.last_error = error;
        }
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delivery() -> PushDelivery {
        PushDelivery::new(
            "d-1",
            1_000,
            1,
            "tok-a",
            "refill:7:1:2024-03-28",
            "Refill reminder",
            "You'll run out of Metformin in 3 days.",
            json!({"type": "refill_alert", "medication_id": "7"}),
        )
    }

    #[test]
    fn test_new_delivery_is_due_immediately() {
        let d = delivery();
        assert_eq!(d.state, DeliveryState::Queued);
        assert_eq!(d.next_attempt_at, d.created_at);
        assert_eq!(d.attempts, 0);
    }

    #[test]
    fn test_start_counts_attempt() {
        let mut d = delivery();
        d.start(2_000).unwrap();
        assert_eq!(d.state, DeliveryState::Sending);
        assert_eq!(d.attempts, 1);
        assert_eq!(d.started_at, Some(2_000));
    }

    #[test]
    fn test_cannot_send_twice() {
        let mut d = delivery();
        d.start(2_000).unwrap();
        d.mark_sent(2_100).unwrap();
        assert!(d.start(3_000).is_err());
        assert!(d.mark_sent(3_000).is_err());
        assert!(d.state.is_terminal());
    }

    #[test]
    fn test_requeue_keeps_previous_error_when_none_given() {
        let mut d = delivery();
        d.start(2_000).unwrap();
        d.requeue(32_000, Some("timeout".to_string()));
        d.start(32_000).unwrap();
        d.requeue(62_000, None);

        assert_eq!(d.state, DeliveryState::Queued);
        assert_eq!(d.next_attempt_at, 62_000);
        assert_eq!(d.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_attempt_budget() {
        let mut d = delivery();
        for i in 0..4 {
            assert!(d.has_attempts_left());
            d.start(i).unwrap();
            d.requeue(i, None);
        }
        assert!(!d.has_attempts_left());
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            DeliveryState::Queued,
            DeliveryState::Sending,
            DeliveryState::Sent,
            DeliveryState::Failed,
        ] {
            assert_eq!(state.to_string().parse::<DeliveryState>().unwrap(), state);
        }
    }
}
