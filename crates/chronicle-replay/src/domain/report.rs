//! Replay report returned by every run that passes validation.

use std::fmt;

use chrono::{DateTime, Utc};
use chronicle_core::event::{Cursor, EventRecord, StreamKey};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::request::ReplayRequest;
use crate::error::HandlerError;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    /// The scan was exhausted.
    Completed,
    /// The run stopped on an unrecoverable error or a fail-fast failure.
    Failed,
    /// The run stopped at a batch boundary on request.
    Cancelled,
}

/// Why a single event was not handled successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The handler returned an error.
    Handler(String),
    /// The payload did not decode into the handler's event type.
    Decode(String),
    /// The handler did not finish within the dispatch timeout.
    Timeout {
        /// Configured timeout in milliseconds.
        after_ms: u64,
    },
    /// No handler is registered for the event's type.
    UnsupportedEventType(String),
    /// The handler panicked.
    Panicked,
}

impl FailureReason {
    /// Whether a handler was actually invoked for this event.
    #[must_use]
    pub fn was_dispatched(&self) -> bool {
        !matches!(self, Self::UnsupportedEventType(_))
    }
}

impl From<HandlerError> for FailureReason {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Failed(msg) => Self::Handler(msg),
            HandlerError::Decode(msg) => Self::Decode(msg),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(msg) => write!(f, "handler failed: {msg}"),
            Self::Decode(msg) => write!(f, "payload decode failed: {msg}"),
            Self::Timeout { after_ms } => write!(f, "handler timed out after {after_ms}ms"),
            Self::UnsupportedEventType(event_type) => {
                write!(f, "unsupported event type: {event_type}")
            }
            Self::Panicked => f.write_str("handler panicked"),
        }
    }
}

/// One event that failed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFailure {
    /// The offending event.
    pub event_id: Uuid,
    /// Its type tag.
    pub event_type: String,
    /// Its stream.
    pub stream: StreamKey,
    /// Its position.
    pub cursor: Cursor,
    /// What went wrong.
    pub reason: FailureReason,
}

impl EventFailure {
    pub(crate) fn new(event: &EventRecord, reason: FailureReason) -> Self {
        Self {
            event_id: event.id(),
            event_type: event.event_type().to_owned(),
            stream: event.stream_key(),
            cursor: event.cursor(),
            reason,
        }
    }
}

/// Position recorded after a batch has been fully attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// One-based batch number within the run.
    pub batch: u64,
    /// Last event of the batch.
    pub cursor: Cursor,
    /// Events in the batch.
    pub events_in_batch: usize,
}

/// Outcome of a replay run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Identifies the run in logs.
    pub run_id: Uuid,
    /// Terminal state.
    pub status: ReplayStatus,
    /// Events fetched.
    pub scanned: u64,
    /// Events handed to a handler.
    pub dispatched: u64,
    /// Events handled successfully.
    pub succeeded: u64,
    /// Events that failed, dispatched or not.
    pub failed: u64,
    /// Events fetched but not attempted after a fail-fast stop.
    pub skipped: u64,
    /// Batches fetched with at least one event.
    pub batches: u64,
    /// Last checkpoint; resume strictly after it.
    pub checkpoint: Option<Cursor>,
    /// Recorded failures in fetch order.
    pub failures: Vec<EventFailure>,
    /// Failures counted but not recorded because of the cap.
    pub failures_truncated: u64,
    /// Reason the run failed, if it did.
    pub error: Option<String>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
}

impl ReplayReport {
    pub(crate) fn start(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        resumed_from: Option<Cursor>,
    ) -> Self {
        Self {
            run_id,
            status: ReplayStatus::Completed,
            scanned: 0,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            batches: 0,
            checkpoint: resumed_from,
            failures: Vec::new(),
            failures_truncated: 0,
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    pub(crate) fn record_failure(&mut self, failure: EventFailure, cap: usize) {
        self.failed += 1;
        if failure.reason.was_dispatched() {
            self.dispatched += 1;
        }
        if self.failures.len() < cap {
            self.failures.push(failure);
        } else {
            self.failures_truncated += 1;
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.dispatched += 1;
        self.succeeded += 1;
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.status = ReplayStatus::Failed;
        self.error = Some(error);
    }

    /// `true` when the run completed and every event succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.status == ReplayStatus::Completed && self.failed == 0
    }

    /// The request that continues `original` from this report's checkpoint.
    #[must_use]
    pub fn resume_request(&self, original: &ReplayRequest) -> ReplayRequest {
        let mut next = original.clone();
        if self.checkpoint.is_some() {
            next.after = self.checkpoint;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn failure(reason: FailureReason) -> EventFailure {
        EventFailure {
            event_id: Uuid::now_v7(),
            event_type: "X".into(),
            stream: StreamKey::new("order", "order-1"),
            cursor: Cursor {
                timestamp: at(1),
                id: Uuid::from_u128(1),
            },
            reason,
        }
    }

    #[test]
    fn test_record_failure_caps_list_but_keeps_counts() {
        let mut report = ReplayReport::start(Uuid::now_v7(), at(0), None);

        report.record_failure(failure(FailureReason::Panicked), 1);
        report.record_failure(
            failure(FailureReason::UnsupportedEventType("Z".into())),
            1,
        );

        assert_eq!(report.failed, 2);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures_truncated, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_resume_request_moves_past_checkpoint() {
        let cursor = Cursor {
            timestamp: at(2),
            id: Uuid::from_u128(2),
        };
        let original = ReplayRequest::new(at(0), at(10)).with_event_type("X");
        let mut report = ReplayReport::start(Uuid::now_v7(), at(0), None);
        report.checkpoint = Some(cursor);

        let next = report.resume_request(&original);

        assert_eq!(next.after, Some(cursor));
        assert_eq!(next.event_type.as_deref(), Some("X"));
        assert_eq!(next.from, original.from);
    }

    #[test]
    fn test_failure_reason_serializes_with_kind_tag() {
        let json = serde_json::to_value(FailureReason::Timeout { after_ms: 50 }).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"kind": "timeout", "detail": {"after_ms": 50}})
        );
    }
}
