//! Error types for the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scratchpad_core::{SaveError, StorageError};
use serde::Serialize;
use tracing::warn;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or unknown access token")]
    InvalidToken,

    #[error("Invalid or expired nonce")]
    InvalidNonce,

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("{0}")]
    Locked(String),

    #[error("Content too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Request failed")]
    Storage(#[source] StorageError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl From<SaveError> for ApiError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::Rejected { reason } => ApiError::Locked(reason),
            SaveError::TooLarge { size, limit } => ApiError::PayloadTooLarge { size, limit },
            SaveError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            success: bool,
            message: String,
            code: &'static str,
        }

        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            ApiError::InvalidNonce => (StatusCode::FORBIDDEN, "INVALID_NONCE"),
            ApiError::UnknownResource(_) => (StatusCode::NOT_FOUND, "UNKNOWN_RESOURCE"),
            ApiError::Locked(_) => (StatusCode::CONFLICT, "LOCKED"),
            ApiError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "TOO_LARGE"),
            ApiError::Storage(e) => {
                warn!("Storage failure: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
            }
            ApiError::Json(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
        };

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
