//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronicle_core::error::StoreError;
use chronicle_replay::ReplayError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// Tracing or exporter setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Store rejection or failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Replay request rejected during validation.
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// No visible event with this id.
    #[error("event not found: {0}")]
    NotFound(Uuid),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Store(StoreError::DuplicateId(_)) => (StatusCode::CONFLICT, "duplicate_id"),
            Self::Store(StoreError::Validation(_)) | Self::Replay(ReplayError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::Store(StoreError::Infrastructure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
            Self::Replay(ReplayError::InvalidRange { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_range")
            }
            Self::Replay(ReplayError::UnsupportedEventType(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_event_type")
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "event_not_found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
