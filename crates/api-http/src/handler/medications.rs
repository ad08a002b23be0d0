use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;
use crate::types::{MedicationPatch, MedicationRequest, MedicationResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use medtrack_core::domain::{MedicationId, RefillEstimate};

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<MedicationResponse>>> {
    let medications = state.medications.list(user_id).await?;
    Ok(Json(medications.into_iter().map(Into::into).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<MedicationRequest>,
) -> ApiResult<(StatusCode, Json<MedicationResponse>)> {
    let medication = state
        .medications
        .create(user_id, body.into_draft()?)
        .await?;
    Ok((StatusCode::CREATED, Json(medication.into())))
}

pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<MedicationId>,
) -> ApiResult<Json<MedicationResponse>> {
    let medication = state.medications.get(user_id, id).await?;
    Ok(Json(medication.into()))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<MedicationId>,
    ApiJson(body): ApiJson<MedicationPatch>,
) -> ApiResult<Json<MedicationResponse>> {
    let medication = state.medications.update(user_id, id, body.into()).await?;
    Ok(Json(medication.into()))
}

pub async fn destroy(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<MedicationId>,
) -> ApiResult<StatusCode> {
    state.medications.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `null` when the medication has no supply tracking
pub async fn refill_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<MedicationId>,
) -> ApiResult<Json<Option<RefillEstimate>>> {
    Ok(Json(state.medications.refill_status(user_id, id).await?))
}
