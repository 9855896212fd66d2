//! Failing and flaky store implementations for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chronicle_core::criteria::{Criteria, Page};
use chronicle_core::error::StoreError;
use chronicle_core::event::{EventRecord, NewEvent, Tombstone};
use chronicle_core::store::{EventReadStore, EventWriteStore};
use uuid::Uuid;

/// A store whose every operation returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn unavailable() -> StoreError {
    StoreError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventWriteStore for FailingEventStore {
    async fn append(&self, _event: NewEvent) -> Result<EventRecord, StoreError> {
        Err(unavailable())
    }

    async fn find_by_id(
        &self,
        _id: Uuid,
        _include_deleted: bool,
    ) -> Result<Option<EventRecord>, StoreError> {
        Err(unavailable())
    }

    async fn soft_delete(&self, _id: Uuid) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn tombstone(&self, _id: Uuid) -> Result<Option<Tombstone>, StoreError> {
        Err(unavailable())
    }
}

#[async_trait]
impl EventReadStore for FailingEventStore {
    async fn find_by_criteria(&self, _criteria: &Criteria) -> Result<Page<EventRecord>, StoreError> {
        Err(unavailable())
    }
}

/// A read store that fails (or hangs) on its first calls, then delegates to
/// an inner store. Counts every call, so tests can also assert that no
/// storage access happened.
pub struct FlakyReadStore {
    inner: Arc<dyn EventReadStore>,
    remaining_failures: AtomicU32,
    hang: bool,
    calls: AtomicUsize,
}

impl FlakyReadStore {
    /// Returns an infrastructure error on the first `failures` calls.
    #[must_use]
    pub fn new(inner: Arc<dyn EventReadStore>, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Never completes the first `failures` calls, so they hit the caller's
    /// fetch timeout.
    #[must_use]
    pub fn hanging(inner: Arc<dyn EventReadStore>, failures: u32) -> Self {
        Self {
            hang: true,
            ..Self::new(inner, failures)
        }
    }

    /// Number of `find_by_criteria` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventReadStore for FlakyReadStore {
    async fn find_by_criteria(&self, criteria: &Criteria) -> Result<Page<EventRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            if self.hang {
                return std::future::pending().await;
            }
            return Err(StoreError::Infrastructure("storage unavailable".into()));
        }
        self.inner.find_by_criteria(criteria).await
    }
}
