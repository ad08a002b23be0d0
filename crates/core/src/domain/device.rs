// Device Token Domain Model

use crate::domain::UserId;
use serde::{Deserialize, Serialize};

/// Push address (FCM token) of an installed client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: i64,
    pub user_id: UserId,
    pub token: String,
    pub created_at: i64,
}

/// Outcome of registering a device token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRegistration {
    /// Token was not known before
    Created,
    /// Caller already owned this token
    AlreadyRegistered,
    /// Token moved over from another account
    Reassigned,
}
