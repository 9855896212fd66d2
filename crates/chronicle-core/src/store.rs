//! Event store contracts.
//!
//! The write side is append-only: there is no update and no physical delete.
//! The read side answers criteria queries and may lag the write side.

use async_trait::async_trait;
use uuid::Uuid;

use crate::criteria::{Criteria, Page};
use crate::error::StoreError;
use crate::event::{EventRecord, NewEvent, Tombstone};

/// Append-only persistence of event records.
#[async_trait]
pub trait EventWriteStore: Send + Sync {
    /// Atomically appends one event. Assigns an id when the input has none.
    ///
    /// Fails with `StoreError::DuplicateId` if the id is already taken and
    /// with `StoreError::Validation` if a required field is missing.
    async fn append(&self, event: NewEvent) -> Result<EventRecord, StoreError>;

    /// Point lookup. Tombstoned records are returned only when
    /// `include_deleted` is set.
    async fn find_by_id(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<EventRecord>, StoreError>;

    /// Marks a record excluded from default reads. Returns `false` if the id
    /// is unknown; marking an already tombstoned record returns `true`.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Returns the tombstone for `id`, if the record has been soft-deleted.
    async fn tombstone(&self, id: Uuid) -> Result<Option<Tombstone>, StoreError>;
}

/// Criteria-driven listing over the log.
#[async_trait]
pub trait EventReadStore: Send + Sync {
    /// Returns one page of matching records, ordered by
    /// [`Criteria::effective_sorts`].
    async fn find_by_criteria(&self, criteria: &Criteria)
    -> Result<Page<EventRecord>, StoreError>;
}
