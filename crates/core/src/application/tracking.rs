// Dose, refill and side-effect logging

use crate::application::medication::TEXT_FIELD_MAX_LEN;
use crate::domain::{
    AdherenceLog, DoseStatus, Medication, MedicationId, NewAdherenceLog, NewRefillLog,
    NewSideEffectLog, RefillLog, SideEffectLog, UserId,
};
use crate::error::{AppError, Result};
use crate::port::{
    AdherenceRepository, MedicationRepository, RefillRepository, SideEffectRepository,
    TimeProvider,
};
use std::sync::Arc;
use tracing::info;

/// Side effect input
#[derive(Debug, Clone, Default)]
pub struct SideEffectDraft {
    pub medication_id: MedicationId,
    pub symptom: String,
    pub severity: u32,
    pub notes: Option<String>,
    /// Stored image path, relative to the media root
    pub image: Option<String>,
}

pub struct TrackingService {
    medications: Arc<dyn MedicationRepository>,
    adherence: Arc<dyn AdherenceRepository>,
    refills: Arc<dyn RefillRepository>,
    side_effects: Arc<dyn SideEffectRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TrackingService {
    pub fn new(
        medications: Arc<dyn MedicationRepository>,
        adherence: Arc<dyn AdherenceRepository>,
        refills: Arc<dyn RefillRepository>,
        side_effects: Arc<dyn SideEffectRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            medications,
            adherence,
            refills,
            side_effects,
            time_provider,
        }
    }

    /// Record a dose response, stamped with the server clock
    ///
    /// A blank reason is stored as no reason.
    pub async fn log_dose(
        &self,
        user_id: UserId,
        medication_id: MedicationId,
        status: DoseStatus,
        reason: Option<String>,
    ) -> Result<AdherenceLog> {
        self.owned_medication(user_id, medication_id).await?;

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if let Some(r) = &reason {
            if r.chars().count() > TEXT_FIELD_MAX_LEN {
                return Err(AppError::Validation(format!(
                    "reason must be at most {} characters.",
                    TEXT_FIELD_MAX_LEN
                )));
            }
        }

        let log = self
            .adherence
            .insert(&NewAdherenceLog {
                user_id,
                medication_id,
                logged_at: self.time_provider.now_millis(),
                status,
                reason,
            })
            .await?;

        info!(
            user_id = %user_id,
            medication_id = %medication_id,
            status = %status,
            "Dose logged"
        );
        Ok(log)
    }

    /// Dose history, newest first
    pub async fn list_doses(
        &self,
        user_id: UserId,
        medication_id: Option<MedicationId>,
    ) -> Result<Vec<AdherenceLog>> {
        self.adherence.list_for_user(user_id, medication_id).await
    }

    /// Record a restock dated today
    pub async fn log_refill(&self, user_id: UserId, medication_id: MedicationId) -> Result<RefillLog> {
        self.owned_medication(user_id, medication_id).await?;

        let log = self
            .refills
            .insert(&NewRefillLog {
                user_id,
                medication_id,
                date: self.time_provider.today(),
            })
            .await?;

        info!(user_id = %user_id, medication_id = %medication_id, "Refill logged");
        Ok(log)
    }

    /// Record a side effect dated today
    pub async fn log_side_effect(
        &self,
        user_id: UserId,
        draft: SideEffectDraft,
    ) -> Result<SideEffectLog> {
        self.owned_medication(user_id, draft.medication_id).await?;

        let symptom = draft.symptom.trim().to_string();
        if symptom.is_empty() {
            return Err(AppError::Validation("symptom may not be blank.".to_string()));
        }
        if symptom.chars().count() > TEXT_FIELD_MAX_LEN {
            return Err(AppError::Validation(format!(
                "symptom must be at most {} characters.",
                TEXT_FIELD_MAX_LEN
            )));
        }

        let log = self
            .side_effects
            .insert(&NewSideEffectLog {
                user_id,
                medication_id: draft.medication_id,
                symptom,
                severity: draft.severity,
                date: self.time_provider.today(),
                notes: draft.notes.filter(|n| !n.trim().is_empty()),
                image: draft.image,
            })
            .await?;

        info!(
            user_id = %user_id,
            medication_id = %log.medication_id,
            symptom = %log.symptom,
            severity = log.severity,
            has_image = log.image.is_some(),
            "Side effect logged"
        );
        Ok(log)
    }

    /// Logs may only reference the caller's own medications
    async fn owned_medication(
        &self,
        user_id: UserId,
        medication_id: MedicationId,
    ) -> Result<Medication> {
        self.medications
            .find_for_user(user_id, medication_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Invalid medication \"{}\" - object does not exist.",
                    medication_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::medication::{MedicationDraft, MedicationService};
    use crate::port::medication_repository::mocks::InMemoryMedicationRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::tracking_repository::mocks::{
        InMemoryAdherenceRepository, InMemoryRefillRepository, InMemorySideEffectRepository,
    };
    use chrono::NaiveDate;

    const NOW: i64 = 1_711_670_400_000;

    struct Fixture {
        tracking: TrackingService,
        medications: MedicationService,
        time: Arc<FixedTimeProvider>,
    }

    fn fixture() -> Fixture {
        let meds = Arc::new(InMemoryMedicationRepository::default());
        let refills = Arc::new(InMemoryRefillRepository::default());
        let time = Arc::new(FixedTimeProvider::new(NOW));
        Fixture {
            tracking: TrackingService::new(
                meds.clone(),
                Arc::new(InMemoryAdherenceRepository::default()),
                refills.clone(),
                Arc::new(InMemorySideEffectRepository::default()),
                time.clone(),
            ),
            medications: MedicationService::new(meds, refills, time.clone(), 3),
            time,
        }
    }

    async fn add_med(f: &Fixture, user_id: UserId) -> MedicationId {
        f.medications
            .create(
                user_id,
                MedicationDraft {
                    name: "Lisinopril".to_string(),
                    schedule: "daily".to_string(),
                    dose: "10mg".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_log_dose_uses_server_clock() {
        let f = fixture();
        let med = add_med(&f, 1).await;

        let log = f
            .tracking
            .log_dose(1, med, DoseStatus::Skipped, Some("  ".to_string()))
            .await
            .unwrap();

        assert_eq!(log.logged_at, NOW);
        assert_eq!(log.reason, None);
    }

    #[tokio::test]
    async fn test_log_dose_for_foreign_medication_is_rejected() {
        let f = fixture();
        let med = add_med(&f, 1).await;

        let err = f
            .tracking
            .log_dose(2, med, DoseStatus::Taken, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_doses_newest_first() {
        let f = fixture();
        let med = add_med(&f, 1).await;

        f.tracking.log_dose(1, med, DoseStatus::Taken, None).await.unwrap();
        f.time.advance(60_000);
        f.tracking.log_dose(1, med, DoseStatus::Snoozed, None).await.unwrap();

        let logs = f.tracking.list_doses(1, None).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, DoseStatus::Snoozed);
        assert!(f.tracking.list_doses(2, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_refill_dated_today() {
        let f = fixture();
        let med = add_med(&f, 1).await;

        let refill = f.tracking.log_refill(1, med).await.unwrap();
        assert_eq!(refill.date, NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
        assert!(f.tracking.log_refill(2, med).await.is_err());
    }

    #[tokio::test]
    async fn test_log_side_effect_validates_symptom() {
        let f = fixture();
        let med = add_med(&f, 1).await;

        let blank = SideEffectDraft {
            medication_id: med,
            symptom: " ".to_string(),
            severity: 2,
            ..Default::default()
        };
        assert!(f.tracking.log_side_effect(1, blank).await.is_err());

        let ok = f
            .tracking
            .log_side_effect(
                1,
                SideEffectDraft {
                    medication_id: med,
                    symptom: "Nausea".to_string(),
                    severity: 3,
                    notes: Some("after breakfast".to_string()),
                    image: Some("side_effects/abc.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(ok.symptom, "Nausea");
        assert_eq!(ok.image.as_deref(), Some("side_effects/abc.png"));
    }
}
