//! HTTP Handlers, one module per resource

pub mod insights;
pub mod medications;
pub mod reminders;
pub mod side_effects;
pub mod users;

use crate::error::ApiError;
use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": medtrack_core::VERSION,
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::Rejected {
        status: axum::http::StatusCode::NOT_FOUND,
        detail: "Not found.".to_string(),
    }
}
