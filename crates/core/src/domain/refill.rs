// Refill Log Domain Model

use crate::domain::{MedicationId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Record that the user restocked a medication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillLog {
    pub id: i64,
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewRefillLog {
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub date: NaiveDate,
}
