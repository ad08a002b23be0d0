// Adherence Log Domain Model

use crate::domain::error::DomainError;
use crate::domain::{MedicationId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Adherence log ID (SQLite rowid)
pub type AdherenceLogId = i64;

/// Response to a dose reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Skipped,
    Snoozed,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Taken => "taken",
            DoseStatus::Skipped => "skipped",
            DoseStatus::Snoozed => "snoozed",
        }
    }
}

impl std::fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "taken" => Ok(DoseStatus::Taken),
            "skipped" => Ok(DoseStatus::Skipped),
            "snoozed" => Ok(DoseStatus::Snoozed),
            other => Err(DomainError::UnknownDoseStatus(other.to_string())),
        }
    }
}

/// Recorded dose response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceLog {
    pub id: AdherenceLogId,
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub logged_at: i64, // epoch ms, set by the server
    pub status: DoseStatus,
    pub reason: Option<String>,
}

/// Dose response about to be inserted
#[derive(Debug, Clone)]
pub struct NewAdherenceLog {
    pub user_id: UserId,
    pub medication_id: MedicationId,
    pub logged_at: i64,
    pub status: DoseStatus,
    pub reason: Option<String>,
}
