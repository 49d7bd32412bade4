//! HTTP-facing error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use famdigest_delivery::OptInError;
use famdigest_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error surfaced through the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request payload; rejected before any processing.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The opt-in resend cool-down has not elapsed.
    #[error("{0}")]
    Cooldown(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Cooldown(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<OptInError> for ApiError {
    fn from(err: OptInError) -> Self {
        match err {
            OptInError::CooldownActive { .. } => Self::Cooldown(err.to_string()),
            OptInError::UnknownSubscription(id) => Self::NotFound(format!("subscription {id}")),
            other => Self::Internal(other.to_string()),
        }
    }
}
