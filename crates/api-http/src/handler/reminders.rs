use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use crate::types::{
    AdherenceLogResponse, DoseQuery, DoseRequest, RefillLogResponse, RefillRequest,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

/// Dose history, newest first; `?medication=<id>` narrows it
pub async fn list_doses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<DoseQuery>,
) -> ApiResult<Json<Vec<AdherenceLogResponse>>> {
    let logs = state.tracking.list_doses(user_id, query.medication).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn log_dose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<DoseRequest>,
) -> ApiResult<(StatusCode, Json<AdherenceLogResponse>)> {
    let (medication_id, status, reason) = body.parts()?;
    let log = state
        .tracking
        .log_dose(user_id, medication_id, status, reason)
        .await?;
    Ok((StatusCode::CREATED, Json(log.into())))
}

pub async fn log_refill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<RefillRequest>,
) -> ApiResult<(StatusCode, Json<RefillLogResponse>)> {
    let log = state
        .tracking
        .log_refill(user_id, body.medication()?)
        .await?;
    Ok((StatusCode::CREATED, Json(log.into())))
}
