// Insights Domain Model

use crate::domain::DoseStatus;
use serde::{Deserialize, Serialize};

/// Side effect occurrences grouped by symptom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomTrend {
    pub symptom: String,
    pub count: i64,
}

/// Skipped doses grouped by reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedDoseReason {
    pub reason: Option<String>,
    pub count: i64,
}

/// Aggregated adherence summary for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub adherence_score: f64,
    pub symptom_trends: Vec<SymptomTrend>,
    pub missed_dose_breakdown: Vec<MissedDoseReason>,
    pub current_streak: u32,
}

/// Percentage of logged doses that were taken (0 when nothing is logged)
pub fn adherence_score(taken: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    taken as f64 / total as f64 * 100.0
}

/// Streak accumulator fed with statuses from newest to oldest
#[derive(Debug, Default)]
pub struct StreakCounter {
    count: u32,
    broken: bool,
}

impl StreakCounter {
    /// Feed the next (older) status; returns false once the streak has ended
    pub fn push(&mut self, status: DoseStatus) -> bool {
        if self.broken {
            return false;
        }
        if status == DoseStatus::Taken {
            self.count += 1;
            true
        } else {
            self.broken = true;
            false
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_without_logs_is_zero() {
        assert_eq!(adherence_score(0, 0), 0.0);
    }

    #[test]
    fn test_score_is_percentage() {
        assert_eq!(adherence_score(3, 4), 75.0);
    }

    #[test]
    fn test_streak_stops_at_first_non_taken() {
        let mut streak = StreakCounter::default();
        let statuses = [
            DoseStatus::Taken,
            DoseStatus::Taken,
            DoseStatus::Snoozed,
            DoseStatus::Taken,
        ];
        for status in statuses {
            if !streak.push(status) {
                break;
            }
        }
        assert_eq!(streak.count(), 2);
    }

    #[test]
    fn test_streak_zero_when_latest_skipped() {
        let mut streak = StreakCounter::default();
        assert!(!streak.push(DoseStatus::Skipped));
        assert!(!streak.push(DoseStatus::Taken));
        assert_eq!(streak.count(), 0);
    }
}
