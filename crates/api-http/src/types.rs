//! HTTP Request/Response Types

use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use medtrack_core::application::{MedicationDraft, Registration};
use medtrack_core::domain::{
    AdherenceLog, DoseStatus, Medication, MedicationId, MedicationUpdate, ProfileUpdate,
    RefillLog, SideEffectLog, User, UserId,
};
use serde::{Deserialize, Deserializer, Serialize};

fn required<T>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("{}: This field is required.", field)))
}

/// Accepts `"a, b"` or `["a", "b"]`; lists are stored comma-joined
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrList>::deserialize(deserializer)?.map(|value| match value {
            StringOrList::One(text) => text,
            StringOrList::Many(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    )
}

/// Distinguishes an absent field (None) from an explicit null (Some(None))
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn form_integer<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{}: A valid integer is required.", field)))
}

fn iso_datetime(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// users
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub chronic_conditions: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub goals: Option<String>,
}

impl RegisterRequest {
    pub fn into_registration(self) -> Result<Registration, ApiError> {
        Ok(Registration {
            username: required("username", self.username)?,
            email: required("email", self.email)?,
            password: required("password", self.password)?,
            dob: self.dob,
            chronic_conditions: self.chronic_conditions.unwrap_or_default(),
            goals: self.goals.unwrap_or_default(),
        })
    }
}

/// `username` may carry an email; `email` alone is accepted too
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn credentials(self) -> Result<(String, String), ApiError> {
        let identifier = required("username", self.username.or(self.email))?;
        let password = required("password", self.password)?;
        Ok((identifier, password))
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub chronic_conditions: String,
    pub goals: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            dob: user.dob,
            chronic_conditions: user.chronic_conditions,
            goals: user.goals,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub dob: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub chronic_conditions: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub goals: Option<String>,
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(req: ProfileRequest) -> Self {
        ProfileUpdate {
            username: req.username,
            email: req.email,
            dob: req.dob,
            chronic_conditions: req.chronic_conditions,
            goals: req.goals,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FcmTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

// ============================================================================
// medications
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MedicationRequest {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub dose: Option<String>,
    #[serde(default)]
    pub start_quantity: Option<u32>,
    #[serde(default)]
    pub dose_quantity: Option<u32>,
    #[serde(default)]
    pub times_per_day: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl MedicationRequest {
    pub fn into_draft(self) -> Result<MedicationDraft, ApiError> {
        Ok(MedicationDraft {
            name: required("name", self.name)?,
            schedule: required("schedule", self.schedule)?,
            dose: required("dose", self.dose)?,
            start_quantity: self.start_quantity,
            dose_quantity: self.dose_quantity,
            times_per_day: self.times_per_day,
            start_date: self.start_date,
        })
    }
}

/// PUT and PATCH body; every field optional
#[derive(Debug, Default, Deserialize)]
pub struct MedicationPatch {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub dose: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_quantity: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dose_quantity: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub times_per_day: Option<Option<u32>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl From<MedicationPatch> for MedicationUpdate {
    fn from(patch: MedicationPatch) -> Self {
        MedicationUpdate {
            name: patch.name,
            schedule: patch.schedule,
            dose: patch.dose,
            start_quantity: patch.start_quantity,
            dose_quantity: patch.dose_quantity,
            times_per_day: patch.times_per_day,
            start_date: patch.start_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationResponse {
    pub id: MedicationId,
    pub user: UserId,
    pub name: String,
    pub schedule: String,
    pub dose: String,
    pub start_quantity: Option<u32>,
    pub dose_quantity: Option<u32>,
    pub times_per_day: Option<u32>,
    pub start_date: NaiveDate,
}

impl From<Medication> for MedicationResponse {
    fn from(med: Medication) -> Self {
        Self {
            id: med.id,
            user: med.user_id,
            name: med.name,
            schedule: med.schedule,
            dose: med.dose,
            start_quantity: med.start_quantity,
            dose_quantity: med.dose_quantity,
            times_per_day: med.times_per_day,
            start_date: med.start_date,
        }
    }
}

// ============================================================================
// reminders
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DoseRequest {
    #[serde(alias = "medication_id")]
    pub medication: Option<MedicationId>,
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DoseRequest {
    pub fn parts(self) -> Result<(MedicationId, DoseStatus, Option<String>), ApiError> {
        let medication = required("medication", self.medication)?;
        let status = required("status", self.status)?;
        let status = status.parse::<DoseStatus>().map_err(|_| {
            ApiError::BadRequest(format!("status: \"{}\" is not a valid choice.", status))
        })?;
        Ok((medication, status, self.reason))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DoseQuery {
    pub medication: Option<MedicationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdherenceLogResponse {
    pub id: i64,
    pub user: UserId,
    pub medication: MedicationId,
    pub datetime: String,
    pub status: DoseStatus,
    pub reason: Option<String>,
}

impl From<AdherenceLog> for AdherenceLogResponse {
    fn from(log: AdherenceLog) -> Self {
        Self {
            id: log.id,
            user: log.user_id,
            medication: log.medication_id,
            datetime: iso_datetime(log.logged_at),
            status: log.status,
            reason: log.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefillRequest {
    #[serde(alias = "medication_id")]
    pub medication: Option<MedicationId>,
}

impl RefillRequest {
    pub fn medication(self) -> Result<MedicationId, ApiError> {
        required("medication", self.medication)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefillLogResponse {
    pub id: i64,
    pub user: UserId,
    pub medication: MedicationId,
    pub date: NaiveDate,
}

impl From<RefillLog> for RefillLogResponse {
    fn from(log: RefillLog) -> Self {
        Self {
            id: log.id,
            user: log.user_id,
            medication: log.medication_id,
            date: log.date,
        }
    }
}

// ============================================================================
// side effects
// ============================================================================

/// JSON body, or the text fields of a multipart form
#[derive(Debug, Default, Deserialize)]
pub struct SideEffectRequest {
    #[serde(alias = "medication_id")]
    pub medication: Option<MedicationId>,
    pub symptom: Option<String>,
    pub severity: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SideEffectRequest {
    /// Fill one multipart text field
    pub fn set_form_field(&mut self, name: &str, value: String) -> Result<(), ApiError> {
        match name {
            "medication" | "medication_id" => self.medication = Some(form_integer(name, &value)?),
            "symptom" => self.symptom = Some(value),
            "severity" => self.severity = Some(form_integer(name, &value)?),
            "notes" => self.notes = Some(value),
            _ => {}
        }
        Ok(())
    }

    pub fn parts(self) -> Result<(MedicationId, String, u32, Option<String>), ApiError> {
        Ok((
            required("medication", self.medication)?,
            required("symptom", self.symptom)?,
            required("severity", self.severity)?,
            self.notes,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffectLogResponse {
    pub id: i64,
    pub user: UserId,
    pub medication: MedicationId,
    pub symptom: String,
    pub severity: u32,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub image: Option<String>,
}

impl From<SideEffectLog> for SideEffectLogResponse {
    fn from(log: SideEffectLog) -> Self {
        Self {
            id: log.id,
            user: log.user_id,
            medication: log.medication_id,
            symptom: log.symptom,
            severity: log.severity,
            date: log.date,
            notes: log.notes,
            image: log.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conditions_accept_list_or_string() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "username": "amira",
            "email": "amira@example.com",
            "password": "s3cret-pass",
            "chronic_conditions": ["asthma", " diabetes ", ""],
            "goals": "walk daily"
        }))
        .unwrap();

        let registration = req.into_registration().unwrap();
        assert_eq!(registration.chronic_conditions, "asthma, diabetes");
        assert_eq!(registration.goals, "walk daily");
    }

    #[test]
    fn test_missing_password_is_reported() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "username": "amira",
            "email": "amira@example.com"
        }))
        .unwrap();

        let err = req.into_registration().unwrap_err();
        assert_eq!(err.to_string(), "password: This field is required.");
    }

    #[test]
    fn test_profile_null_dob_clears() {
        let req: ProfileRequest = serde_json::from_value(json!({ "dob": null })).unwrap();
        assert_eq!(req.dob, Some(None));

        let req: ProfileRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.dob, None);
    }

    #[test]
    fn test_refill_accepts_medication_id_alias() {
        let req: RefillRequest = serde_json::from_value(json!({ "medication_id": 3 })).unwrap();
        assert_eq!(req.medication().unwrap(), 3);
    }

    #[test]
    fn test_dose_rejects_unknown_status() {
        let req: DoseRequest =
            serde_json::from_value(json!({ "medication": 1, "status": "missed" })).unwrap();
        let err = req.parts().unwrap_err();
        assert_eq!(err.to_string(), "status: \"missed\" is not a valid choice.");
    }

    #[test]
    fn test_side_effect_form_fields() {
        let mut req = SideEffectRequest::default();
        req.set_form_field("medication", "4".into()).unwrap();
        req.set_form_field("symptom", "nausea".into()).unwrap();
        req.set_form_field("severity", "2".into()).unwrap();
        assert!(req.set_form_field("severity", "high".into()).is_err());

        let (medication, symptom, severity, notes) = req.parts().unwrap();
        assert_eq!((medication, symptom.as_str(), severity), (4, "nausea", 2));
        assert!(notes.is_none());
    }

    #[test]
    fn test_adherence_datetime_is_rfc3339() {
        let log = AdherenceLog {
            id: 1,
            user_id: 2,
            medication_id: 3,
            logged_at: 1_711_670_400_000,
            status: DoseStatus::Taken,
            reason: None,
        };
        let response = AdherenceLogResponse::from(log);
        assert_eq!(response.datetime, "2024-03-29T00:00:00.000Z");
    }
}
