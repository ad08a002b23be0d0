// Medication use cases

use crate::domain::{
    Medication, MedicationId, MedicationUpdate, NewMedication, RefillEstimate, UserId,
};
use crate::error::{AppError, Result};
use crate::port::{MedicationRepository, RefillRepository, TimeProvider};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

pub const TEXT_FIELD_MAX_LEN: usize = 255;

/// Medication input for creation
#[derive(Debug, Clone, Default)]
pub struct MedicationDraft {
    pub name: String,
    pub schedule: String,
    pub dose: String,
    pub start_quantity: Option<u32>,
    pub dose_quantity: Option<u32>,
    pub times_per_day: Option<u32>,
    /// Defaults to today
    pub start_date: Option<NaiveDate>,
}

pub struct MedicationService {
    medications: Arc<dyn MedicationRepository>,
    refills: Arc<dyn RefillRepository>,
    time_provider: Arc<dyn TimeProvider>,
    refill_threshold_days: i64,
}

impl MedicationService {
    pub fn new(
        medications: Arc<dyn MedicationRepository>,
        refills: Arc<dyn RefillRepository>,
        time_provider: Arc<dyn TimeProvider>,
        refill_threshold_days: i64,
    ) -> Self {
        Self {
            medications,
            refills,
            time_provider,
            refill_threshold_days,
        }
    }

    pub async fn create(&self, user_id: UserId, draft: MedicationDraft) -> Result<Medication> {
        validate_text("name", &draft.name)?;
        validate_text("schedule", &draft.schedule)?;
        validate_text("dose", &draft.dose)?;

        let medication = self
            .medications
            .insert(&NewMedication {
                user_id,
                name: draft.name.trim().to_string(),
                schedule: draft.schedule.trim().to_string(),
                dose: draft.dose.trim().to_string(),
                start_quantity: draft.start_quantity,
                dose_quantity: draft.dose_quantity,
                times_per_day: draft.times_per_day,
                start_date: draft
                    .start_date
                    .unwrap_or_else(|| self.time_provider.today()),
                created_at: self.time_provider.now_millis(),
            })
            .await?;

        info!(
            user_id = %user_id,
            medication_id = %medication.id,
            name = %medication.name,
            "Medication created"
        );
        Ok(medication)
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<Medication>> {
        self.medications.list_for_user(user_id).await
    }

    pub async fn get(&self, user_id: UserId, id: MedicationId) -> Result<Medication> {
        self.medications
            .find_for_user(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("medication {}", id)))
    }

    pub async fn update(
        &self,
        user_id: UserId,
        id: MedicationId,
        mut update: MedicationUpdate,
    ) -> Result<Medication> {
        let mut medication = self.get(user_id, id).await?;

        for (field, value) in [
            ("name", update.name.as_mut()),
            ("schedule", update.schedule.as_mut()),
            ("dose", update.dose.as_mut()),
        ] {
            if let Some(value) = value {
                validate_text(field, value)?;
                *value = value.trim().to_string();
            }
        }

        medication.apply(update);
        self.medications.update(&medication).await?;

        info!(user_id = %user_id, medication_id = %id, "Medication updated");
        Ok(medication)
    }

    pub async fn delete(&self, user_id: UserId, id: MedicationId) -> Result<()> {
        if !self.medications.delete_for_user(user_id, id).await? {
            return Err(AppError::NotFound(format!("medication {}", id)));
        }
        info!(user_id = %user_id, medication_id = %id, "Medication deleted");
        Ok(())
    }

    /// Supply estimate; None when the medication has no supply tracking
    pub async fn refill_status(
        &self,
        user_id: UserId,
        id: MedicationId,
    ) -> Result<Option<RefillEstimate>> {
        let medication = self.get(user_id, id).await?;
        let last_refill = self.refills.latest_for_medication(id).await?;

        Ok(medication.refill_estimate(
            last_refill,
            self.time_provider.today(),
            self.refill_threshold_days,
        ))
    }
}

/// Required, non-blank, bounded text field
pub fn validate_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} may not be blank.", field)));
    }
    if value.chars().count() > TEXT_FIELD_MAX_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters.",
            field, TEXT_FIELD_MAX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewRefillLog;
    use crate::port::medication_repository::mocks::InMemoryMedicationRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::tracking_repository::mocks::InMemoryRefillRepository;

    // 2024-03-29T00:00:00Z
    const NOW: i64 = 1_711_670_400_000;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> (MedicationService, Arc<InMemoryRefillRepository>) {
        let refills = Arc::new(InMemoryRefillRepository::default());
        let svc = MedicationService::new(
            Arc::new(InMemoryMedicationRepository::default()),
            refills.clone(),
            Arc::new(FixedTimeProvider::new(NOW)),
            3,
        );
        (svc, refills)
    }

    fn metformin() -> MedicationDraft {
        MedicationDraft {
            name: "Metformin".to_string(),
            schedule: "morning, evening".to_string(),
            dose: "500mg".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults_start_date_to_today() {
        let (svc, _) = service();
        let med = svc.create(1, metformin()).await.unwrap();

        assert_eq!(med.start_date, date(2024, 3, 29));
        assert_eq!(med.user_id, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_and_long_fields() {
        let (svc, _) = service();

        let mut blank = metformin();
        blank.name = "   ".to_string();
        assert!(matches!(
            svc.create(1, blank).await,
            Err(AppError::Validation(_))
        ));

        let mut long = metformin();
        long.dose = "x".repeat(256);
        assert!(svc.create(1, long).await.is_err());
    }

    #[tokio::test]
    async fn test_other_users_medication_is_not_found() {
        let (svc, _) = service();
        let med = svc.create(1, metformin()).await.unwrap();

        assert!(matches!(svc.get(2, med.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.delete(2, med.id).await, Err(AppError::NotFound(_))));
        assert!(svc.list(2).await.unwrap().is_empty());
        svc.delete(1, med.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_update() {
        let (svc, _) = service();
        let med = svc.create(1, metformin()).await.unwrap();

        let updated = svc
            .update(
                1,
                med.id,
                MedicationUpdate {
                    dose: Some("850mg".to_string()),
                    times_per_day: Some(Some(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.dose, "850mg");
        assert_eq!(updated.name, "Metformin");
        assert_eq!(updated.times_per_day, Some(2));
    }

    #[tokio::test]
    async fn test_refill_status_untracked_is_none() {
        let (svc, _) = service();
        let med = svc.create(1, metformin()).await.unwrap();

        assert!(svc.refill_status(1, med.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refill_status_restarts_after_refill() {
        let (svc, refills) = service();
        let mut draft = metformin();
        draft.start_quantity = Some(30);
        draft.dose_quantity = Some(1);
        draft.times_per_day = Some(2);
        draft.start_date = Some(date(2024, 3, 1));
        let med = svc.create(1, draft).await.unwrap();

        // 15 days from 03-01 -> ran out 03-16
        let before = svc.refill_status(1, med.id).await.unwrap().unwrap();
        assert_eq!(before.days_left, -13);
        assert!(before.needs_refill);

        refills
            .insert(&NewRefillLog {
                user_id: 1,
                medication_id: med.id,
                date: date(2024, 3, 28),
            })
            .await
            .unwrap();

        let after = svc.refill_status(1, med.id).await.unwrap().unwrap();
        assert_eq!(after.supply_start, date(2024, 3, 28));
        assert_eq!(after.days_left, 14);
        assert!(!after.needs_refill);
    }
}
