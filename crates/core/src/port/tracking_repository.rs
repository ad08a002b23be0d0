// Tracking Repository Ports (dose, refill and side-effect logs)

use crate::domain::{
    AdherenceLog, DoseStatus, MedicationId, MissedDoseReason, NewAdherenceLog, NewRefillLog,
    NewSideEffectLog, RefillLog, SideEffectLog, SymptomTrend, UserId,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Dose response persistence
#[async_trait]
pub trait AdherenceRepository: Send + Sync {
    async fn insert(&self, log: &NewAdherenceLog) -> Result<AdherenceLog>;

    /// Logs of a user, newest first, optionally for one medication
    async fn list_for_user(
        &self,
        user_id: UserId,
        medication_id: Option<MedicationId>,
    ) -> Result<Vec<AdherenceLog>>;

    /// Count logs of a user (all statuses when `status` is None)
    async fn count_for_user(&self, user_id: UserId, status: Option<DoseStatus>) -> Result<i64>;

    /// Statuses newest first, paged
    async fn statuses_newest_first(
        &self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DoseStatus>>;

    /// Skipped doses logged at or after `since_millis`, grouped by reason,
    /// ordered by count desc then reason asc
    async fn missed_reasons_since(
        &self,
        user_id: UserId,
        since_millis: i64,
    ) -> Result<Vec<MissedDoseReason>>;
}

/// Refill persistence
#[async_trait]
pub trait RefillRepository: Send + Sync {
    async fn insert(&self, log: &NewRefillLog) -> Result<RefillLog>;

    /// Date of the most recent refill of a medication
    async fn latest_for_medication(&self, medication_id: MedicationId)
        -> Result<Option<NaiveDate>>;
}

/// Side effect persistence
#[async_trait]
pub trait SideEffectRepository: Send + Sync {
    async fn insert(&self, log: &NewSideEffectLog) -> Result<SideEffectLog>;

    /// Side effects dated on or after `since`, grouped by symptom,
    /// ordered by count desc then symptom asc
    async fn symptom_counts_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<SymptomTrend>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory dose log store
    #[derive(Default)]
    pub struct InMemoryAdherenceRepository {
        rows: Mutex<Vec<AdherenceLog>>,
    }

    #[async_trait]
    impl AdherenceRepository for InMemoryAdherenceRepository {
        async fn insert(&self, log: &NewAdherenceLog) -> Result<AdherenceLog> {
            let mut rows = self.rows.lock().unwrap();
            let stored = AdherenceLog {
                id: rows.len() as i64 + 1,
                user_id: log.user_id,
                medication_id: log.medication_id,
                logged_at: log.logged_at,
                status: log.status,
                reason: log.reason.clone(),
            };
            rows.push(stored.clone());
            Ok(stored)
        }

        async fn list_for_user(
            &self,
            user_id: UserId,
            medication_id: Option<MedicationId>,
        ) -> Result<Vec<AdherenceLog>> {
            let rows = self.rows.lock().unwrap();
            let mut logs: Vec<AdherenceLog> = rows
                .iter()
                .filter(|l| l.user_id == user_id)
                .filter(|l| medication_id.map_or(true, |m| l.medication_id == m))
                .cloned()
                .collect();
            logs.sort_by(|a, b| (b.logged_at, b.id).cmp(&(a.logged_at, a.id)));
            Ok(logs)
        }

        async fn count_for_user(&self, user_id: UserId, status: Option<DoseStatus>) -> Result<i64> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|l| l.user_id == user_id)
                .filter(|l| status.map_or(true, |s| l.status == s))
                .count() as i64)
        }

        async fn statuses_newest_first(
            &self,
            user_id: UserId,
            offset: i64,
            limit: i64,
        ) -> Result<Vec<DoseStatus>> {
            let logs = self.list_for_user(user_id, None).await?;
            Ok(logs
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|l| l.status)
                .collect())
        }

        async fn missed_reasons_since(
            &self,
            user_id: UserId,
            since_millis: i64,
        ) -> Result<Vec<MissedDoseReason>> {
            let rows = self.rows.lock().unwrap();
            let mut counts: BTreeMap<Option<String>, i64> = BTreeMap::new();
            for log in rows.iter().filter(|l| {
                l.user_id == user_id
                    && l.status == DoseStatus::Skipped
                    && l.logged_at >= since_millis
            }) {
                *counts.entry(log.reason.clone()).or_default() += 1;
            }
            let mut reasons: Vec<MissedDoseReason> = counts
                .into_iter()
                .map(|(reason, count)| MissedDoseReason { reason, count })
                .collect();
            reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
            Ok(reasons)
        }
    }

    /// In-memory refill log store
    #[derive(Default)]
    pub struct InMemoryRefillRepository {
        rows: Mutex<Vec<RefillLog>>,
    }

    #[async_trait]
    impl RefillRepository for InMemoryRefillRepository {
        async fn insert(&self, log: &NewRefillLog) -> Result<RefillLog> {
            let mut rows = self.rows.lock().unwrap();
            let stored = RefillLog {
                id: rows.len() as i64 + 1,
                user_id: log.user_id,
                medication_id: log.medication_id,
                date: log.date,
            };
            rows.push(stored.clone());
            Ok(stored)
        }

        async fn latest_for_medication(
            &self,
            medication_id: MedicationId,
        ) -> Result<Option<NaiveDate>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|r| r.medication_id == medication_id)
                .map(|r| r.date)
                .max())
        }
    }

    /// In-memory side effect store
    #[derive(Default)]
    pub struct InMemorySideEffectRepository {
        rows: Mutex<Vec<SideEffectLog>>,
    }

    #[async_trait]
    impl SideEffectRepository for InMemorySideEffectRepository {
        async fn insert(&self, log: &NewSideEffectLog) -> Result<SideEffectLog> {
            let mut rows = self.rows.lock().unwrap();
            let stored = SideEffectLog {
                id: rows.len() as i64 + 1,
                user_id: log.user_id,
                medication_id: log.medication_id,
                symptom: log.symptom.clone(),
                severity: log.severity,
                date: log.date,
                notes: log.notes.clone(),
                image: log.image.clone(),
            };
            rows.push(stored.clone());
            Ok(stored)
        }

        async fn symptom_counts_since(
            &self,
            user_id: UserId,
            since: NaiveDate,
        ) -> Result<Vec<SymptomTrend>> {
            let rows = self.rows.lock().unwrap();
            let mut counts: BTreeMap<String, i64> = BTreeMap::new();
            for log in rows.iter().filter(|l| l.user_id == user_id && l.date >= since) {
                *counts.entry(log.symptom.clone()).or_default() += 1;
            }
            let mut trends: Vec<SymptomTrend> = counts
                .into_iter()
                .map(|(symptom, count)| SymptomTrend { symptom, count })
                .collect();
            trends.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symptom.cmp(&b.symptom)));
            Ok(trends)
        }
    }
}
