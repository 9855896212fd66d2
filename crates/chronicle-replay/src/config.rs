//! Replay engine configuration.

use std::time::Duration;

use chronicle_core::criteria::MAX_PER_PAGE;

use crate::error::ReplayError;

/// Batch size used when a request does not name one.
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// Tunables for replay runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Batch size when the request omits one.
    pub default_batch_size: u32,
    /// Largest batch a request may ask for.
    pub max_batch_size: u32,
    /// Deadline for a single batch fetch.
    pub fetch_timeout: Duration,
    /// Deadline for a single handler invocation.
    pub dispatch_timeout: Duration,
    /// Retries after a failed fetch before the run fails.
    pub max_fetch_retries: u32,
    /// First retry delay; doubles on every further attempt.
    pub retry_backoff: Duration,
    /// Cap on the retry delay.
    pub max_retry_backoff: Duration,
    /// Stop at the first per-event failure.
    pub fail_fast: bool,
    /// Streams dispatched concurrently within a batch.
    pub max_concurrent_streams: usize,
    /// Failures kept in a report; further ones are only counted.
    pub max_recorded_failures: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
            max_batch_size: MAX_PER_PAGE,
            fetch_timeout: Duration::from_secs(30),
            dispatch_timeout: Duration::from_secs(10),
            max_fetch_retries: 3,
            retry_backoff: Duration::from_millis(200),
            max_retry_backoff: Duration::from_secs(5),
            fail_fast: false,
            max_concurrent_streams: 16,
            max_recorded_failures: 1_000,
        }
    }
}

impl ReplayConfig {
    /// Checks that the values can drive a run.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Validation` naming the offending setting.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_PER_PAGE {
            return Err(ReplayError::Validation(format!(
                "max_batch_size must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        if self.default_batch_size == 0 || self.default_batch_size > self.max_batch_size {
            return Err(ReplayError::Validation(
                "default_batch_size must be between 1 and max_batch_size".into(),
            ));
        }
        if self.max_concurrent_streams == 0 {
            return Err(ReplayError::Validation(
                "max_concurrent_streams must be at least 1".into(),
            ));
        }
        if self.fetch_timeout.is_zero() || self.dispatch_timeout.is_zero() {
            return Err(ReplayError::Validation("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(1_u32 << attempt.min(16))
            .min(self.max_retry_backoff)
    }
}
