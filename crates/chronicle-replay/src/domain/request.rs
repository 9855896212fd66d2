//! Replay request.

use chrono::{DateTime, Utc};
use chronicle_core::criteria::{Criteria, EventField, Filter, Operator};
use chronicle_core::event::Cursor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to replay: a mandatory time window narrowed by optional filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Replay exactly this event; bypasses batching.
    pub id: Option<Uuid>,
    /// Only events of this type.
    pub event_type: Option<String>,
    /// Only events of this aggregate instance.
    pub aggregate_id: Option<String>,
    /// Only events of this aggregate kind.
    pub aggregate_type: Option<String>,
    /// Inclusive lower bound on `timestamp`, compared at microsecond
    /// precision like stored timestamps.
    pub from: DateTime<Utc>,
    /// Inclusive upper bound on `timestamp`.
    pub to: DateTime<Utc>,
    /// Events per batch; the engine default applies when absent.
    pub batch_size: Option<u32>,
    /// Resume strictly after this position (a previous report's checkpoint).
    pub after: Option<Cursor>,
    /// Overrides the configured fail-fast mode for this run.
    pub fail_fast: Option<bool>,
}

impl ReplayRequest {
    /// Replays everything in `[from, to]`.
    #[must_use]
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            id: None,
            event_type: None,
            aggregate_id: None,
            aggregate_type: None,
            from,
            to,
            batch_size: None,
            after: None,
            fail_fast: None,
        }
    }

    /// Narrows to a single event.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Narrows to one event type.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Narrows to one aggregate instance.
    #[must_use]
    pub fn with_aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    /// Narrows to one aggregate kind.
    #[must_use]
    pub fn with_aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Resumes strictly after `cursor`.
    #[must_use]
    pub fn resume_after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Overrides fail-fast mode.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    /// Criteria selecting the next batch after `after`.
    pub(crate) fn batch_criteria(&self, batch_size: u32, after: Option<Cursor>) -> Criteria {
        let mut criteria = Criteria::new()
            .filter(Filter::new(EventField::Timestamp, Operator::Gte, self.from))
            .filter(Filter::new(EventField::Timestamp, Operator::Lte, self.to));
        if let Some(id) = self.id {
            criteria = criteria.filter(Filter::eq(EventField::Id, id));
        }
        if let Some(event_type) = &self.event_type {
            criteria = criteria.filter(Filter::eq(EventField::EventType, event_type.as_str()));
        }
        if let Some(aggregate_type) = &self.aggregate_type {
            criteria =
                criteria.filter(Filter::eq(EventField::AggregateType, aggregate_type.as_str()));
        }
        if let Some(aggregate_id) = &self.aggregate_id {
            criteria = criteria.filter(Filter::eq(EventField::AggregateId, aggregate_id.as_str()));
        }
        criteria.paginate(1, batch_size).after(after)
    }
}
