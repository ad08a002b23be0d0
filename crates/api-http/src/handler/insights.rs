use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use medtrack_core::domain::Insights;

pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Insights>> {
    Ok(Json(state.insights.insights(user_id).await?))
}
