//! Replay error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Rejections raised while validating a replay request, before any I/O.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// `from` is after `to`.
    #[error("invalid replay range: from {from} is after to {to}")]
    InvalidRange {
        /// Requested lower bound.
        from: DateTime<Utc>,
        /// Requested upper bound.
        to: DateTime<Utc>,
    },

    /// No handler is registered for the event type.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// Any other malformed request or configuration value.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Failure reported by a replay handler for a single event.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The payload could not be decoded into the handler's event type.
    #[error("payload decode failed: {0}")]
    Decode(String),
}
