// Medication Repository Port (Interface)

use crate::domain::{Medication, MedicationId, NewMedication, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for medication persistence
///
/// Every per-user lookup is scoped by owner: another user's medication is
/// indistinguishable from a missing one.
#[async_trait]
pub trait MedicationRepository: Send + Sync {
    async fn insert(&self, medication: &NewMedication) -> Result<Medication>;

    async fn find_for_user(&self, user_id: UserId, id: MedicationId)
        -> Result<Option<Medication>>;

    /// All medications of a user, ordered by ID
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Medication>>;

    async fn update(&self, medication: &Medication) -> Result<()>;

    /// Delete (cascades to logs); returns false if nothing matched
    async fn delete_for_user(&self, user_id: UserId, id: MedicationId) -> Result<bool>;

    /// Medications with start, dose and daily quantities all set
    async fn list_refill_tracked(&self) -> Result<Vec<Medication>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory medication store
    #[derive(Default)]
    pub struct InMemoryMedicationRepository {
        rows: Mutex<Vec<Medication>>,
        next_id: Mutex<MedicationId>,
    }

    #[async_trait]
    impl MedicationRepository for InMemoryMedicationRepository {
        async fn insert(&self, medication: &NewMedication) -> Result<Medication> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let stored = Medication {
                id: *next_id,
                user_id: medication.user_id,
                name: medication.name.clone(),
                schedule: medication.schedule.clone(),
                dose: medication.dose.clone(),
                start_quantity: medication.start_quantity,
                dose_quantity: medication.dose_quantity,
                times_per_day: medication.times_per_day,
                start_date: medication.start_date,
                created_at: medication.created_at,
            };
            self.rows.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        async fn find_for_user(
            &self,
            user_id: UserId,
            id: MedicationId,
        ) -> Result<Option<Medication>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|m| m.id == id && m.user_id == user_id)
                .cloned())
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Medication>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|m| m.user_id == user_id).cloned().collect())
        }

        async fn update(&self, medication: &Medication) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|m| m.id == medication.id) {
                Some(slot) => {
                    *slot = medication.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("medication {}", medication.id))),
            }
        }

        async fn delete_for_user(&self, user_id: UserId, id: MedicationId) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|m| !(m.id == id && m.user_id == user_id));
            Ok(rows.len() < before)
        }

        async fn list_refill_tracked(&self) -> Result<Vec<Medication>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|m| {
                    m.start_quantity.is_some()
                        && m.dose_quantity.is_some()
                        && m.times_per_day.is_some()
                })
                .cloned()
                .collect())
        }
    }
}
