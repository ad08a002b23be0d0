use crate::auth::AuthUser;
use crate::error::{ApiResult, Detail};
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;
use crate::types::{
    FcmTokenRequest, LoginRequest, LoginResponse, ProfileRequest, RegisterRequest, UserResponse,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use medtrack_core::domain::TokenRegistration;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state.accounts.register(body.into_registration()?).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (identifier, password) = body.credentials()?;
    let user = state.accounts.authenticate(&identifier, &password).await?;
    let access = state.tokens.issue(user.id)?;

    Ok(Json(LoginResponse {
        access,
        token_type: "Bearer",
        expires_in: state.tokens.expires_in(),
        user: user.into(),
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = state.accounts.profile(user_id).await?;
    Ok(Json(user.into()))
}

/// PUT and PATCH: both apply only the fields present
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.accounts.update_profile(user_id, body.into()).await?;
    Ok(Json(user.into()))
}

pub async fn register_fcm_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<FcmTokenRequest>,
) -> ApiResult<(StatusCode, Json<Detail>)> {
    let token = body.token.unwrap_or_default();
    let outcome = state.accounts.register_device_token(user_id, &token).await?;

    Ok(match outcome {
        TokenRegistration::Created | TokenRegistration::Reassigned => {
            (StatusCode::CREATED, Json(Detail::new("Token registered.")))
        }
        TokenRegistration::AlreadyRegistered => {
            (StatusCode::OK, Json(Detail::new("Token already registered.")))
        }
    })
}

/// Token comes from the JSON body or `?token=`
pub async fn unregister_fcm_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<FcmTokenRequest>,
    body: Option<ApiJson<FcmTokenRequest>>,
) -> ApiResult<StatusCode> {
    let token = body
        .and_then(|ApiJson(body)| body.token)
        .or(query.token)
        .unwrap_or_default();

    state.accounts.unregister_device_token(user_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
