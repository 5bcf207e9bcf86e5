//! Error types for the webhook endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use tally_notify::NotifyError;

/// Webhook request errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or invalid signature")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NotifyError> for ApiError {
    fn from(error: NotifyError) -> Self {
        match error {
            NotifyError::InvalidSignature => ApiError::Unauthorized,
            NotifyError::InvalidUpdate(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(msg) => {
                error!(error = %msg, "Webhook handling failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal details stay in the log.
        let message = match &self {
            ApiError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
