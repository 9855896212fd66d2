//! Event record and related value types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::to_micros;
use crate::error::StoreError;

/// Maximum length of the `event_type`, `aggregate_type` and `aggregate_id` tags.
pub const MAX_TAG_LEN: usize = 255;

/// One immutable fact appended to the log.
///
/// Fields are private: once a record has been built by a store adapter it can
/// only be read. Soft deletion lives in a separate tombstone index
/// (see [`Tombstone`]) so the record itself never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    id: Uuid,
    event_type: String,
    aggregate_type: String,
    aggregate_id: String,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw column values used by adapters to rebuild a persisted record.
#[derive(Debug, Clone)]
pub struct RecordParts {
    /// Unique event identifier.
    pub id: Uuid,
    /// Event type tag.
    pub event_type: String,
    /// Owning entity kind.
    pub aggregate_type: String,
    /// Owning entity instance.
    pub aggregate_id: String,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Occurrence time.
    pub timestamp: DateTime<Utc>,
    /// Append time.
    pub created_at: DateTime<Utc>,
    /// Always equal to `created_at`; kept for the persisted shape.
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Rebuilds a record from persisted columns.
    #[must_use]
    pub fn from_parts(parts: RecordParts) -> Self {
        Self {
            id: parts.id,
            event_type: parts.event_type,
            aggregate_type: parts.aggregate_type,
            aggregate_id: parts.aggregate_id,
            payload: parts.payload,
            timestamp: parts.timestamp,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Unique event identifier, also the replay idempotency key.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event type tag.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Kind of the owning aggregate.
    #[must_use]
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Identifier of the owning aggregate instance.
    #[must_use]
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// Opaque payload, schema owned by the event type.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Occurrence time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Time the record was appended.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Equal to [`EventRecord::created_at`]; records are never updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The stream this record belongs to.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.aggregate_type, &self.aggregate_id)
    }

    /// The `(timestamp, id)` position of this record in the total order.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// Trait implemented by typed payload enums.
///
/// Each variant maps to an event type tag, so writers never spell the tag by
/// hand.
pub trait EventPayload: Serialize {
    /// The event type tag for this payload variant.
    fn event_type(&self) -> &'static str;
}

/// Append input. The store assigns `id` when it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    /// Caller-chosen identifier; must be unique across the log.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Event type tag.
    pub event_type: String,
    /// Kind of the owning aggregate.
    pub aggregate_type: String,
    /// Identifier of the owning aggregate instance.
    pub aggregate_id: String,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Occurrence time.
    pub timestamp: DateTime<Utc>,
}

impl NewEvent {
    /// Builds an append input from a typed payload.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the payload cannot be serialized.
    pub fn from_payload<P: EventPayload>(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: &P,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| StoreError::Validation(format!("payload serialization failed: {e}")))?;
        Ok(Self {
            id: None,
            event_type: payload.event_type().to_owned(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            payload: value,
            timestamp,
        })
    }

    /// Sets a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Checks that every required field is populated and well formed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.id.is_some_and(|id| id.is_nil()) {
            return Err(StoreError::Validation("id must not be the nil uuid".into()));
        }
        validate_tag("event_type", &self.event_type)?;
        validate_tag("aggregate_type", &self.aggregate_type)?;
        validate_tag("aggregate_id", &self.aggregate_id)?;
        Ok(())
    }

    /// Seals the input into an immutable record. The occurrence time is
    /// truncated to microseconds so every adapter stores the same value.
    #[must_use]
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id,
            event_type: self.event_type,
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            payload: self.payload,
            timestamp: to_micros(self.timestamp),
            created_at,
            updated_at: created_at,
        }
    }
}

fn validate_tag(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_TAG_LEN {
        return Err(StoreError::Validation(format!(
            "{field} exceeds {MAX_TAG_LEN} characters"
        )));
    }
    Ok(())
}

/// Identifies one independent stream of the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// Kind of the owning aggregate.
    pub aggregate_type: String,
    /// Identifier of the owning aggregate instance.
    pub aggregate_id: String,
}

impl StreamKey {
    /// Creates a new stream key.
    #[must_use]
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// A position in the log's total order: `(timestamp, id)`.
///
/// Field order matters: the derived `Ord` compares `timestamp` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    /// Occurrence time of the event at this position.
    pub timestamp: DateTime<Utc>,
    /// Id of the event at this position.
    pub id: Uuid,
}

impl Cursor {
    /// Returns the cursor with its timestamp truncated to microseconds, the
    /// precision records are stored at.
    #[must_use]
    pub fn at_storage_precision(self) -> Self {
        Self {
            timestamp: to_micros(self.timestamp),
            id: self.id,
        }
    }
}

/// Soft-delete marker excluding an event from default reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// The excluded event.
    pub event_id: Uuid,
    /// When the marker was written.
    pub deleted_at: DateTime<Utc>,
}
