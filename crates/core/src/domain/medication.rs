// Medication Domain Model

use crate::domain::UserId;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Medication ID (SQLite rowid)
pub type MedicationId = i64;

/// Medication registered by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub user_id: UserId,
    pub name: String,
    pub schedule: String,
    pub dose: String,

    // Supply tracking (all three required for refill estimation)
    pub start_quantity: Option<u32>,
    pub dose_quantity: Option<u32>,
    pub times_per_day: Option<u32>,
    pub start_date: NaiveDate,

    pub created_at: i64, // epoch ms
}

/// Medication about to be inserted
#[derive(Debug, Clone)]
pub struct NewMedication {
    pub user_id: UserId,
    pub name: String,
    pub schedule: String,
    pub dose: String,
    pub start_quantity: Option<u32>,
    pub dose_quantity: Option<u32>,
    pub times_per_day: Option<u32>,
    pub start_date: NaiveDate,
    pub created_at: i64,
}

/// Partial medication update
///
/// Quantity fields are doubly optional: `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub dose: Option<String>,
    pub start_quantity: Option<Option<u32>>,
    pub dose_quantity: Option<Option<u32>>,
    pub times_per_day: Option<Option<u32>>,
    pub start_date: Option<NaiveDate>,
}

/// Estimated supply state for one medication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillEstimate {
    pub medication_id: MedicationId,
    pub supply_start: NaiveDate,
    pub days_supply: i64,
    pub depletion_date: NaiveDate,
    pub days_left: i64,
    pub needs_refill: bool,
}

impl Medication {
    /// Units consumed per day, if supply tracking is configured
    ///
    /// Returns None when any tracking field is missing or the product is zero.
    pub fn daily_consumption(&self) -> Option<u32> {
        let dose = self.dose_quantity?;
        let times = self.times_per_day?;
        self.start_quantity?;
        dose.checked_mul(times).filter(|daily| *daily > 0)
    }

    /// Estimate when the current supply runs out
    ///
    /// The supply restarts at the latest refill when that is after `start_date`.
    /// Partial days of supply are dropped.
    pub fn refill_estimate(
        &self,
        last_refill: Option<NaiveDate>,
        today: NaiveDate,
        threshold_days: i64,
    ) -> Option<RefillEstimate> {
        let daily = self.daily_consumption()?;
        let quantity = self.start_quantity?;

        let supply_start = match last_refill {
            Some(refill) if refill > self.start_date => refill,
            _ => self.start_date,
        };

        let days_supply = i64::from(quantity / daily);
        let depletion_date = supply_start + Duration::days(days_supply);
        let days_left = (depletion_date - today).num_days();

        Some(RefillEstimate {
            medication_id: self.id,
            supply_start,
            days_supply,
            depletion_date,
            days_left,
            needs_refill: days_left <= threshold_days,
        })
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: MedicationUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(schedule) = update.schedule {
            self.schedule = schedule;
        }
        if let Some(dose) = update.dose {
            self.dose = dose;
        }
        if let Some(q) = update.start_quantity {
            self.start_quantity = q;
        }
        if let Some(q) = update.dose_quantity {
            self.dose_quantity = q;
        }
        if let Some(t) = update.times_per_day {
            self.times_per_day = t;
        }
        if let Some(date) = update.start_date {
            self.start_date = date;
        }
    }
}
