//! HTTP Error Types
//!
//! Every failure leaves the API as `{"detail": "<message>"}`.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medtrack_core::error::AppError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

const INTERNAL_DETAIL: &str = "Internal server error.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Request was throttled. Try again later.")]
    Throttled,

    /// Extractor rejection carrying its own status
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
}

/// Wire shape of every error (and of plain acknowledgements)
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: String,
}

impl Detail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::App(err) => match err {
                AppError::Validation(_) | AppError::Domain(_) | AppError::Serialization(_) => {
                    StatusCode::BAD_REQUEST
                }
                AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Conflict(_) => StatusCode::CONFLICT,
                AppError::Database(_)
                | AppError::Io(_)
                | AppError::Push(_)
                | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Rejected { status, .. } => *status,
        }
    }

    /// Client-facing message; server faults are never echoed back
    pub fn detail(&self) -> String {
        if self.status().is_server_error() {
            return INTERNAL_DETAIL.to_string();
        }
        match self {
            ApiError::App(AppError::Validation(msg))
            | ApiError::App(AppError::Unauthorized(msg))
            | ApiError::App(AppError::NotFound(msg))
            | ApiError::App(AppError::Conflict(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(Detail::new(self.detail()))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                StatusCode::BAD_REQUEST
            }
            other => other.status(),
        };
        ApiError::Rejected {
            status,
            detail: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected {
            status: StatusCode::NOT_FOUND,
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_errors_map_to_status() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::Database("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_message_passed_through() {
        let err = ApiError::from(AppError::Validation("Token is required.".into()));
        assert_eq!(err.detail(), "Token is required.");
    }

    #[test]
    fn test_internal_message_not_leaked() {
        let err = ApiError::from(AppError::Database("no such table: users".into()));
        assert_eq!(err.detail(), INTERNAL_DETAIL);
    }

    #[test]
    fn test_throttled_is_429() {
        assert_eq!(ApiError::Throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
