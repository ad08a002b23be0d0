// Push Gateway Port
// Abstraction over the third-party push service (FCM)

use crate::domain::PushMessage;
use async_trait::async_trait;
use thiserror::Error;

/// Accepted by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    pub message_id: Option<String>,
}

/// Push errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Token is unknown to the gateway (never retry, drop the token)
    #[error("Invalid device token: {0}")]
    InvalidToken(String),

    /// Gateway accepted the request but reported a per-message failure
    #[error("Gateway rejected message: {0}")]
    Rejected(String),

    /// Non-2xx HTTP status
    #[error("Gateway returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, timeout or decoding problem
    #[error("Transport error: {0}")]
    Transport(String),

    /// Gateway not configured (missing server key)
    #[error("Push gateway not configured: {0}")]
    NotConfigured(String),
}

impl PushError {
    /// Whether sending the same message again could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PushError::InvalidToken(_) | PushError::NotConfigured(_))
    }
}

/// Push Gateway trait
///
/// Implementations:
/// - FcmGateway: FCM legacy HTTP API
/// - MockPushGateway: scripted results for tests
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send one notification
    ///
    /// # Errors
    /// - PushError::InvalidToken if the device is no longer registered
    /// - PushError::Transport / Http / Rejected for transient failures
    async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock gateway behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with this error
        Fail(PushError),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Push Gateway for testing
    ///
    /// Scripted results are consumed first; afterwards the default behavior applies.
    pub struct MockPushGateway {
        behavior: Arc<Mutex<MockBehavior>>,
        script: Arc<Mutex<VecDeque<Result<(), PushError>>>>,
        sent: Arc<Mutex<Vec<PushMessage>>>,
    }

    impl MockPushGateway {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                script: Arc::new(Mutex::new(VecDeque::new())),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(error: PushError) -> Self {
            Self::new(MockBehavior::Fail(error))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        /// Queue one result for the next call
        pub fn push_result(&self, result: Result<(), PushError>) {
            self.script.lock().unwrap().push_back(result);
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Messages the gateway was asked to send (including failed calls)
        pub fn sent(&self) -> Vec<PushMessage> {
            self.sent.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PushGateway for MockPushGateway {
        async fn send(&self, message: &PushMessage) -> Result<PushReceipt, PushError> {
            self.sent.lock().unwrap().push(message.clone());

            let scripted = self.script.lock().unwrap().pop_front();
            if let Some(result) = scripted {
                return result.map(|_| PushReceipt { message_id: None });
            }

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(PushReceipt {
                    message_id: Some(format!("mock-{}", self.call_count())),
                }),
                MockBehavior::Fail(err) => Err(err),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
