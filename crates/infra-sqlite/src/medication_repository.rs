// SQLite MedicationRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::NaiveDate;
use medtrack_core::domain::{Medication, MedicationId, NewMedication, UserId};
use medtrack_core::error::{AppError, Result};
use medtrack_core::port::MedicationRepository;
use sqlx::SqlitePool;

pub struct SqliteMedicationRepository {
    pool: SqlitePool,
}

impl SqliteMedicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MedicationRepository for SqliteMedicationRepository {
    async fn insert(&self, medication: &NewMedication) -> Result<Medication> {
        let row = sqlx::query_as::<_, MedicationRow>(
            r#"
            INSERT INTO medications (
                user_id, name, schedule, dose,
                start_quantity, dose_quantity, times_per_day, start_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(medication.user_id)
        .bind(&medication.name)
        .bind(&medication.schedule)
        .bind(&medication.dose)
        .bind(medication.start_quantity.map(i64::from))
        .bind(medication.dose_quantity.map(i64::from))
        .bind(medication.times_per_day.map(i64::from))
        .bind(medication.start_date)
        .bind(medication.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        id: MedicationId,
    ) -> Result<Option<Medication>> {
        let row = sqlx::query_as::<_, MedicationRow>(
            "SELECT * FROM medications WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Medication>> {
        let rows: Vec<MedicationRow> =
            sqlx::query_as("SELECT * FROM medications WHERE user_id = ? ORDER BY id ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, medication: &Medication) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE medications
            SET name = ?, schedule = ?, dose = ?,
                start_quantity = ?, dose_quantity = ?, times_per_day = ?, start_date = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&medication.name)
        .bind(&medication.schedule)
        .bind(&medication.dose)
        .bind(medication.start_quantity.map(i64::from))
        .bind(medication.dose_quantity.map(i64::from))
        .bind(medication.times_per_day.map(i64::from))
        .bind(medication.start_date)
        .bind(medication.id)
        .bind(medication.user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("medication {}", medication.id)));
        }
        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId, id: MedicationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM medications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_refill_tracked(&self) -> Result<Vec<Medication>> {
        let rows: Vec<MedicationRow> = sqlx::query_as(
            r#"
            SELECT * FROM medications
            WHERE start_quantity IS NOT NULL
              AND dose_quantity IS NOT NULL
              AND times_per_day IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MedicationRow {
    id: i64,
    user_id: i64,
    name: String,
    schedule: String,
    dose: String,
    start_quantity: Option<i64>,
    dose_quantity: Option<i64>,
    times_per_day: Option<i64>,
    start_date: NaiveDate,
    created_at: i64,
}

/// Negative or oversized stored values read back as untracked
fn quantity(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl From<MedicationRow> for Medication {
    fn from(row: MedicationRow) -> Self {
        Medication {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            schedule: row.schedule,
            dose: row.dose,
            start_quantity: quantity(row.start_quantity),
            dose_quantity: quantity(row.dose_quantity),
            times_per_day: quantity(row.times_per_day),
            start_date: row.start_date,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteUserRepository};
    use medtrack_core::domain::NewUser;
    use medtrack_core::port::UserRepository;

    /// Fresh database with one user (id returned)
    pub(crate) async fn setup_with_user() -> (SqlitePool, UserId) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let user = SqliteUserRepository::new(pool.clone())
            .insert(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                dob: None,
                chronic_conditions: String::new(),
                goals: String::new(),
                created_at: 0,
            })
            .await
            .unwrap();
        (pool, user.id)
    }

    pub(crate) fn new_med(user_id: UserId, tracked: bool) -> NewMedication {
        NewMedication {
            user_id,
            name: "Metformin".to_string(),
            schedule: "morning".to_string(),
            dose: "500mg".to_string(),
            start_quantity: tracked.then_some(60),
            dose_quantity: tracked.then_some(1),
            times_per_day: tracked.then_some(2),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_scope_by_owner() {
        let (pool, user_id) = setup_with_user().await;
        let repo = SqliteMedicationRepository::new(pool);

        let med = repo.insert(&new_med(user_id, true)).await.unwrap();
        assert_eq!(med.start_quantity, Some(60));
        assert_eq!(med.start_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        assert!(repo.find_for_user(user_id, med.id).await.unwrap().is_some());
        assert!(repo.find_for_user(user_id + 1, med.id).await.unwrap().is_none());
        assert!(!repo.delete_for_user(user_id + 1, med.id).await.unwrap());
        assert!(repo.delete_for_user(user_id, med.id).await.unwrap());
        assert!(repo.list_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_clears_quantity() {
        let (pool, user_id) = setup_with_user().await;
        let repo = SqliteMedicationRepository::new(pool);
        let mut med = repo.insert(&new_med(user_id, true)).await.unwrap();

        med.times_per_day = None;
        med.dose = "1g".to_string();
        repo.update(&med).await.unwrap();

        let stored = repo.find_for_user(user_id, med.id).await.unwrap().unwrap();
        assert_eq!(stored.times_per_day, None);
        assert_eq!(stored.dose, "1g");
    }

    #[tokio::test]
    async fn test_list_refill_tracked() {
        let (pool, user_id) = setup_with_user().await;
        let repo = SqliteMedicationRepository::new(pool);
        let tracked = repo.insert(&new_med(user_id, true)).await.unwrap();
        repo.insert(&new_med(user_id, false)).await.unwrap();

        let meds = repo.list_refill_tracked().await.unwrap();
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].id, tracked.id);
    }
}
