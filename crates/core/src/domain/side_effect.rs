// Side Effect Log Domain Model

use crate::domain::{MedicationId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reported side effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectLog {
    pub id: i64,
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub symptom: String,
    pub severity: u32,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub image: Option<String>, // path relative to the media root
}

#[derive(Debug, Clone)]
pub struct NewSideEffectLog {
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub symptom: String,
    pub severity: u32,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub image: Option<String>,
}
