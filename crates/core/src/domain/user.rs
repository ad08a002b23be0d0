// User Domain Model

use chrono::NaiveDate;
use serde::Serialize;

/// User ID (SQLite rowid)
pub type UserId = i64;

/// Registered account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub dob: Option<NaiveDate>,
    pub chronic_conditions: String,
    pub goals: String,
    pub created_at: i64, // epoch ms
}

/// Account about to be inserted (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub dob: Option<NaiveDate>,
    pub chronic_conditions: String,
    pub goals: String,
    pub created_at: i64,
}

/// Partial profile update (PUT and PATCH share it)
///
/// `dob` is doubly optional: `Some(None)` clears the date of birth.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub dob: Option<Option<NaiveDate>>,
    pub chronic_conditions: Option<String>,
    pub goals: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.dob.is_none()
            && self.chronic_conditions.is_none()
            && self.goals.is_none()
    }
}

impl User {
    /// Apply a profile update in place
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(dob) = update.dob {
            self.dob = dob;
        }
        if let Some(conditions) = update.chronic_conditions {
            self.chronic_conditions = conditions;
        }
        if let Some(goals) = update.goals {
            self.goals = goals;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            username: "amira".to_string(),
            email: "amira@example.com".to_string(),
            password_hash: "hash".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 4, 2),
            chronic_conditions: "asthma".to_string(),
            goals: String::new(),
            created_at: 1000,
        }
    }

    #[test]
    fn test_apply_partial_update_keeps_untouched_fields() {
        let mut user = sample_user();
        user.apply(ProfileUpdate {
            goals: Some("walk daily".to_string()),
            ..Default::default()
        });

        assert_eq!(user.goals, "walk daily");
        assert_eq!(user.chronic_conditions, "asthma");
        assert_eq!(user.dob, NaiveDate::from_ymd_opt(1990, 4, 2));
    }

    #[test]
    fn test_apply_can_clear_dob() {
        let mut user = sample_user();
        user.apply(ProfileUpdate {
            dob: Some(None),
            ..Default::default()
        });
        assert!(user.dob.is_none());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "amira");
    }
}
