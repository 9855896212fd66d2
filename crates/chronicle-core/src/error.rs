//! Store error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by event store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An event with this id has already been appended.
    #[error("duplicate event id: {0}")]
    DuplicateId(Uuid),

    /// The input was rejected before any I/O took place.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backing storage failed or is unavailable.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl StoreError {
    /// Returns `true` for errors that may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}
