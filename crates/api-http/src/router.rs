//! Route table

use crate::handler::{self, insights, medications, reminders, side_effects, users};
use crate::middleware::{add_request_id, log_errors, X_REQUEST_ID};
use crate::rate_limiter::throttle;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

/// Headroom for multipart boundaries and text fields on top of the image
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.media.max_upload_bytes() + FORM_OVERHEAD_BYTES;

    let auth_routes = Router::new()
        .route("/api/users/register/", post(users::register))
        .route("/api/users/login/", post(users::login))
        .route_layer(middleware::from_fn_with_state(
            state.auth_limiter.clone(),
            throttle,
        ));

    let user_routes = Router::new()
        .route(
            "/api/users/profile/",
            get(users::profile)
                .put(users::update_profile)
                .patch(users::update_profile),
        )
        .route(
            "/api/users/fcm-token/",
            post(users::register_fcm_token).delete(users::unregister_fcm_token),
        );

    let medication_routes = Router::new()
        .route(
            "/api/medications/",
            get(medications::list).post(medications::create),
        )
        .route(
            "/api/medications/:id/",
            get(medications::retrieve)
                .put(medications::update)
                .patch(medications::update)
                .delete(medications::destroy),
        )
        .route(
            "/api/medications/:id/refill-status/",
            get(medications::refill_status),
        );

    let tracking_routes = Router::new()
        .route(
            "/api/reminders/reminder-response/",
            get(reminders::list_doses).post(reminders::log_dose),
        )
        .route("/api/reminders/refill-log/", post(reminders::log_refill))
        .route(
            "/api/sideeffects/side-effect-log/",
            post(side_effects::create).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/insights/", get(insights::summary));

    Router::new()
        .route("/health", get(handler::health))
        .merge(auth_routes)
        .merge(user_routes)
        .merge(medication_routes)
        .merge(tracking_routes)
        .fallback(handler::not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_errors))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(middleware::from_fn(add_request_id))
        .layer(CorsLayer::permissive())
}
