// User Repository Port (Interface)

use crate::domain::{NewUser, User, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for account persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return it with its assigned ID
    async fn insert(&self, user: &NewUser) -> Result<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Find user by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Find user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile fields of an existing user
    async fn update(&self, user: &User) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory user store
    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn insert(&self, user: &NewUser) -> Result<User> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username == user.username) {
                return Err(AppError::Conflict("username already exists".to_string()));
            }
            let stored = User {
                id: users.len() as UserId + 1,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                dob: user.dob,
                chronic_conditions: user.chronic_conditions.clone(),
                goals: user.goals.clone(),
                created_at: user.created_at,
            };
            users.push(stored.clone());
            Ok(stored)
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.username == username).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn update(&self, user: &User) -> Result<()> {
            let mut users = self.users.lock().unwrap();
            match users.iter_mut().find(|u| u.id == user.id) {
                Some(slot) => {
                    *slot = user.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("user {}", user.id))),
            }
        }
    }
}
