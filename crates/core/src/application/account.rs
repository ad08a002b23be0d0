// Account use cases: registration, login, profile, device tokens

use crate::domain::{NewUser, ProfileUpdate, TokenRegistration, User, UserId};
use crate::error::{AppError, Result};
use crate::port::{DeviceTokenRepository, PasswordHasher, TimeProvider, UserRepository};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Registration input (password in clear, hashed before storage)
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub dob: Option<NaiveDate>,
    pub chronic_conditions: String,
    pub goals: String,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    devices: Arc<dyn DeviceTokenRepository>,
    hasher: Arc<dyn PasswordHasher>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        devices: Arc<dyn DeviceTokenRepository>,
        hasher: Arc<dyn PasswordHasher>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            users,
            devices,
            hasher,
            time_provider,
        }
    }

    /// Create an account
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_string();

        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&registration.password)?;

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AppError::Validation(
                "A user with that username already exists.".to_string(),
            ));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Validation(
                "A user with that email already exists.".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(&registration.password)?;
        let user = self
            .users
            .insert(&NewUser {
                username,
                email,
                password_hash,
                dob: registration.dob,
                chronic_conditions: registration.chronic_conditions,
                goals: registration.goals,
                created_at: self.time_provider.now_millis(),
            })
            .await
            .map_err(duplicate_account)?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Check credentials; `identifier` is a username or an email
    ///
    /// Every failure yields the same Unauthorized message.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User> {
        let identifier = identifier.trim();
        let user = match self.users.find_by_username(identifier).await? {
            Some(user) => Some(user),
            None if identifier.contains('@') => self.users.find_by_email(identifier).await?,
            None => None,
        };

        let Some(user) = user else {
            warn!(identifier = %identifier, "Login for unknown account");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        info!(user_id = %user.id, "User authenticated");
        Ok(user)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    /// Apply a partial profile update
    pub async fn update_profile(&self, user_id: UserId, mut update: ProfileUpdate) -> Result<User> {
        let mut user = self.profile(user_id).await?;

        if let Some(username) = update.username.as_mut() {
            *username = username.trim().to_string();
            validate_username(username)?;
            if let Some(other) = self.users.find_by_username(username).await? {
                if other.id != user_id {
                    return Err(AppError::Validation(
                        "A user with that username already exists.".to_string(),
                    ));
                }
            }
        }
        if let Some(email) = update.email.as_mut() {
            *email = email.trim().to_string();
            validate_email(email)?;
            if let Some(other) = self.users.find_by_email(email).await? {
                if other.id != user_id {
                    return Err(AppError::Validation(
                        "A user with that email already exists.".to_string(),
                    ));
                }
            }
        }

        if update.is_empty() {
            return Ok(user);
        }

        user.apply(update);
        self.users.update(&user).await.map_err(duplicate_account)?;

        info!(user_id = %user_id, "Profile updated");
        Ok(user)
    }

    /// Attach a push token to the user
    ///
    /// A token held by another account moves to this one.
    pub async fn register_device_token(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<TokenRegistration> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation("Token is required.".to_string()));
        }

        let now = self.time_provider.now_millis();
        let outcome = self.devices.register(user_id, token, now).await?;

        info!(user_id = %user_id, outcome = ?outcome, "Device token registered");
        Ok(outcome)
    }

    pub async fn unregister_device_token(&self, user_id: UserId, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Validation("Token is required.".to_string()));
        }

        if !self.devices.remove_for_user(user_id, token).await? {
            return Err(AppError::NotFound("Token not found.".to_string()));
        }

        info!(user_id = %user_id, "Device token removed");
        Ok(())
    }
}

/// A unique-constraint hit that slipped past the lookups (concurrent signup)
fn duplicate_account(err: AppError) -> AppError {
    match err {
        AppError::Conflict(detail) if detail.contains("email") => {
            AppError::Validation("A user with that email already exists.".to_string())
        }
        AppError::Conflict(_) => {
            AppError::Validation("A user with that username already exists.".to_string())
        }
        other => other,
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if len == 0 {
        return Err(AppError::Validation("Username is required.".to_string()));
    }
    if len > USERNAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {} characters.",
            USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(AppError::Validation(
            "Username may contain only letters, numbers, and @/./+/-/_ characters.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(
            "Enter a valid email address.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters.",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}
