// SQLite repositories for dose, refill and side-effect logs

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::NaiveDate;
use medtrack_core::domain::{
    AdherenceLog, DoseStatus, MedicationId, MissedDoseReason, NewAdherenceLog, NewRefillLog,
    NewSideEffectLog, RefillLog, SideEffectLog, SymptomTrend, UserId,
};
use medtrack_core::error::Result;
use medtrack_core::port::{AdherenceRepository, RefillRepository, SideEffectRepository};
use sqlx::SqlitePool;

pub struct SqliteAdherenceRepository {
    pool: SqlitePool,
}

impl SqliteAdherenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdherenceRepository for SqliteAdherenceRepository {
    async fn insert(&self, log: &NewAdherenceLog) -> Result<AdherenceLog> {
        let row = sqlx::query_as::<_, AdherenceRow>(
            r#"
            INSERT INTO adherence_logs (user_id, medication_id, logged_at, status, reason)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(log.user_id)
        .bind(log.medication_id)
        .bind(log.logged_at)
        .bind(log.status.as_str())
        .bind(&log.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_log()
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        medication_id: Option<MedicationId>,
    ) -> Result<Vec<AdherenceLog>> {
        let rows: Vec<AdherenceRow> = sqlx::query_as(
            r#"
            SELECT * FROM adherence_logs
            WHERE user_id = ? AND (? IS NULL OR medication_id = ?)
            ORDER BY logged_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(medication_id)
        .bind(medication_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(AdherenceRow::into_log).collect()
    }

    async fn count_for_user(&self, user_id: UserId, status: Option<DoseStatus>) -> Result<i64> {
        let status = status.map(|s| s.as_str());
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM adherence_logs WHERE user_id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(user_id)
        .bind(status)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn statuses_newest_first(
        &self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DoseStatus>> {
        let statuses: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT status FROM adherence_logs
            WHERE user_id = ?
            ORDER BY logged_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        statuses
            .iter()
            .map(|s| s.parse::<DoseStatus>().map_err(Into::into))
            .collect()
    }

    async fn missed_reasons_since(
        &self,
        user_id: UserId,
        since_millis: i64,
    ) -> Result<Vec<MissedDoseReason>> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT reason, COUNT(*) AS count
            FROM adherence_logs
            WHERE user_id = ? AND status = ? AND logged_at >= ?
            GROUP BY reason
            ORDER BY count DESC, reason ASC
            "#,
        )
        .bind(user_id)
        .bind(DoseStatus::Skipped.as_str())
        .bind(since_millis)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(reason, count)| MissedDoseReason { reason, count })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdherenceRow {
    id: i64,
    user_id: i64,
    medication_id: i64,
    logged_at: i64,
    status: String,
    reason: Option<String>,
}

impl AdherenceRow {
    fn into_log(self) -> Result<AdherenceLog> {
        Ok(AdherenceLog {
            id: self.id,
            user_id: self.user_id,
            medication_id: self.medication_id,
            logged_at: self.logged_at,
            status: self.status.parse()?,
            reason: self.reason,
        })
    }
}

pub struct SqliteRefillRepository {
    pool: SqlitePool,
}

impl SqliteRefillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefillRepository for SqliteRefillRepository {
    async fn insert(&self, log: &NewRefillLog) -> Result<RefillLog> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO refill_logs (user_id, medication_id, date) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(log.user_id)
        .bind(log.medication_id)
        .bind(log.date)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(RefillLog {
            id,
            user_id: log.user_id,
            medication_id: log.medication_id,
            date: log.date,
        })
    }

    async fn latest_for_medication(
        &self,
        medication_id: MedicationId,
    ) -> Result<Option<NaiveDate>> {
        let latest: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT date FROM refill_logs WHERE medication_id = ? ORDER BY date DESC LIMIT 1",
        )
        .bind(medication_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(latest)
    }
}

pub struct SqliteSideEffectRepository {
    pool: SqlitePool,
}

impl SqliteSideEffectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SideEffectRepository for SqliteSideEffectRepository {
    async fn insert(&self, log: &NewSideEffectLog) -> Result<SideEffectLog> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO side_effect_logs (user_id, medication_id, symptom, severity, date, notes, image)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(log.user_id)
        .bind(log.medication_id)
        .bind(&log.symptom)
        .bind(i64::from(log.severity))
        .bind(log.date)
        .bind(&log.notes)
        .bind(&log.image)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(SideEffectLog {
            id,
            user_id: log.user_id,
            medication_id: log.medication_id,
            symptom: log.symptom.clone(),
            severity: log.severity,
            date: log.date,
            notes: log.notes.clone(),
            image: log.image.clone(),
        })
    }

    async fn symptom_counts_since(
        &self,
        user_id: UserId,
        since: NaiveDate,
    ) -> Result<Vec<SymptomTrend>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT symptom, COUNT(*) AS count
            FROM side_effect_logs
            WHERE user_id = ? AND date >= ?
            GROUP BY symptom
            ORDER BY count DESC, symptom ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(symptom, count)| SymptomTrend { symptom, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication_repository::tests::{new_med, setup_with_user};
    use crate::SqliteMedicationRepository;
    use medtrack_core::error::AppError;
    use medtrack_core::port::MedicationRepository;

    async fn setup() -> (SqlitePool, UserId, MedicationId) {
        let (pool, user_id) = setup_with_user().await;
        let med = SqliteMedicationRepository::new(pool.clone())
            .insert(&new_med(user_id, true))
            .await
            .unwrap();
        (pool, user_id, med.id)
    }

    fn dose(user_id: UserId, med: MedicationId, at: i64, status: DoseStatus, reason: Option<&str>) -> NewAdherenceLog {
        NewAdherenceLog {
            user_id,
            medication_id: med,
            logged_at: at,
            status,
            reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_dose_history_and_counts() {
        let (pool, user, med) = setup().await;
        let repo = SqliteAdherenceRepository::new(pool);

        repo.insert(&dose(user, med, 100, DoseStatus::Taken, None)).await.unwrap();
        repo.insert(&dose(user, med, 200, DoseStatus::Skipped, Some("away"))).await.unwrap();
        repo.insert(&dose(user, med, 300, DoseStatus::Taken, None)).await.unwrap();

        let logs = repo.list_for_user(user, None).await.unwrap();
        assert_eq!(logs.iter().map(|l| l.logged_at).collect::<Vec<_>>(), vec![300, 200, 100]);
        assert_eq!(repo.list_for_user(user, Some(med + 1)).await.unwrap().len(), 0);

        assert_eq!(repo.count_for_user(user, None).await.unwrap(), 3);
        assert_eq!(repo.count_for_user(user, Some(DoseStatus::Taken)).await.unwrap(), 2);

        let page = repo.statuses_newest_first(user, 1, 5).await.unwrap();
        assert_eq!(page, vec![DoseStatus::Skipped, DoseStatus::Taken]);
    }

    #[tokio::test]
    async fn test_missed_reasons_grouped() {
        let (pool, user, med) = setup().await;
        let repo = SqliteAdherenceRepository::new(pool);

        repo.insert(&dose(user, med, 50, DoseStatus::Skipped, Some("old"))).await.unwrap();
        repo.insert(&dose(user, med, 100, DoseStatus::Skipped, Some("nausea"))).await.unwrap();
        repo.insert(&dose(user, med, 110, DoseStatus::Skipped, Some("nausea"))).await.unwrap();
        repo.insert(&dose(user, med, 120, DoseStatus::Skipped, None)).await.unwrap();
        repo.insert(&dose(user, med, 130, DoseStatus::Snoozed, Some("busy"))).await.unwrap();

        let reasons = repo.missed_reasons_since(user, 100).await.unwrap();
        assert_eq!(
            reasons,
            vec![
                MissedDoseReason { reason: Some("nausea".to_string()), count: 2 },
                MissedDoseReason { reason: None, count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_dose_for_missing_medication_is_rejected() {
        let (pool, user, med) = setup().await;
        let repo = SqliteAdherenceRepository::new(pool);

        let err = repo
            .insert(&dose(user, med + 100, 1, DoseStatus::Taken, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_latest_refill() {
        let (pool, user, med) = setup().await;
        let repo = SqliteRefillRepository::new(pool);
        assert_eq!(repo.latest_for_medication(med).await.unwrap(), None);

        for day in [3, 20, 11] {
            repo.insert(&NewRefillLog {
                user_id: user,
                medication_id: med,
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            })
            .await
            .unwrap();
        }

        assert_eq!(
            repo.latest_for_medication(med).await.unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 20)
        );
    }

    #[tokio::test]
    async fn test_symptom_counts() {
        let (pool, user, med) = setup().await;
        let repo = SqliteSideEffectRepository::new(pool);
        let entry = |symptom: &str, day: u32| NewSideEffectLog {
            user_id: user,
            medication_id: med,
            symptom: symptom.to_string(),
            severity: 2,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            notes: None,
            image: None,
        };

        repo.insert(&entry("Headache", 1)).await.unwrap();
        repo.insert(&entry("Nausea", 10)).await.unwrap();
        repo.insert(&entry("Dizziness", 12)).await.unwrap();
        let stored = repo.insert(&entry("Nausea", 15)).await.unwrap();
        assert!(stored.id > 0);

        let trends = repo
            .symptom_counts_since(user, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0], SymptomTrend { symptom: "Nausea".to_string(), count: 2 });
        assert_eq!(trends[1].symptom, "Dizziness");
    }

    #[tokio::test]
    async fn test_logs_cascade_with_medication() {
        let (pool, user, med) = setup().await;
        let logs = SqliteAdherenceRepository::new(pool.clone());
        logs.insert(&dose(user, med, 1, DoseStatus::Taken, None)).await.unwrap();

        SqliteMedicationRepository::new(pool)
            .delete_for_user(user, med)
            .await
            .unwrap();

        assert_eq!(logs.count_for_user(user, None).await.unwrap(), 0);
    }
}
