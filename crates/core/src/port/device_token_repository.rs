// Device Token Repository Port (Interface)

use crate::domain::{DeviceToken, TokenRegistration, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for FCM tokens
#[async_trait]
pub trait DeviceTokenRepository: Send + Sync {
    /// Register `token` for `user_id`
    ///
    /// Tokens are globally unique; a token owned by another user is moved.
    async fn register(
        &self,
        user_id: UserId,
        token: &str,
        now_millis: i64,
    ) -> Result<TokenRegistration>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<DeviceToken>>;

    /// Remove a token owned by `user_id`; false if it was not theirs
    async fn remove_for_user(&self, user_id: UserId, token: &str) -> Result<bool>;

    /// Remove a token regardless of owner (gateway says it is dead)
    async fn remove(&self, token: &str) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory device token store
    #[derive(Default)]
    pub struct InMemoryDeviceTokenRepository {
        tokens: Mutex<Vec<DeviceToken>>,
    }

    #[async_trait]
    impl DeviceTokenRepository for InMemoryDeviceTokenRepository {
        async fn register(
            &self,
            user_id: UserId,
            token: &str,
            now_millis: i64,
        ) -> Result<TokenRegistration> {
            let mut tokens = self.tokens.lock().unwrap();
            if let Some(existing) = tokens.iter_mut().find(|t| t.token == token) {
                if existing.user_id == user_id {
                    return Ok(TokenRegistration::AlreadyRegistered);
                }
                existing.user_id = user_id;
                return Ok(TokenRegistration::Reassigned);
            }
            let id = tokens.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            tokens.push(DeviceToken {
                id,
                user_id,
                token: token.to_string(),
                created_at: now_millis,
            });
            Ok(TokenRegistration::Created)
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<DeviceToken>> {
            let tokens = self.tokens.lock().unwrap();
            Ok(tokens.iter().filter(|t| t.user_id == user_id).cloned().collect())
        }

        async fn remove_for_user(&self, user_id: UserId, token: &str) -> Result<bool> {
            let mut tokens = self.tokens.lock().unwrap();
            let before = tokens.len();
            tokens.retain(|t| !(t.user_id == user_id && t.token == token));
            Ok(tokens.len() < before)
        }

        async fn remove(&self, token: &str) -> Result<bool> {
            let mut tokens = self.tokens.lock().unwrap();
            let before = tokens.len();
            tokens.retain(|t| t.token != token);
            Ok(tokens.len() < before)
        }
    }
}
