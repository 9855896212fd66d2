//! In-memory implementation of the event store contracts.
//!
//! Evaluates criteria in process with the same semantics as the SQL adapter.
//! Suitable for tests and for running the API without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use chronicle_core::clock::{Clock, SystemClock, to_micros};
use chronicle_core::criteria::{
    Criteria, EventField, Filter, FilterValue, Operator, Page, SortDirection,
};
use chronicle_core::error::StoreError;
use chronicle_core::event::{EventRecord, NewEvent, Tombstone};
use chronicle_core::store::{EventReadStore, EventWriteStore};

#[derive(Default)]
struct MemoryState {
    events: HashMap<Uuid, EventRecord>,
    tombstones: HashMap<Uuid, Tombstone>,
}

/// Event store held entirely in process memory.
pub struct InMemoryEventStore {
    clock: Arc<dyn Clock>,
    state: RwLock<MemoryState>,
}

impl fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventStore").finish_non_exhaustive()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryEventStore {
    /// Creates an empty store stamping `created_at` from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Number of records held, tombstoned ones included.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Infrastructure` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.events.len())
    }

    /// Returns `true` if nothing has been appended.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Infrastructure` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Infrastructure("event store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Infrastructure("event store lock poisoned".into()))
    }
}

#[async_trait]
impl EventWriteStore for InMemoryEventStore {
    async fn append(&self, event: NewEvent) -> Result<EventRecord, StoreError> {
        event.validate()?;
        let id = event.id.unwrap_or_else(Uuid::now_v7);
        let mut state = self.write()?;
        if state.events.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        let record = event.into_record(id, self.clock.now_micros());
        state.events.insert(id, record.clone());
        debug!(event_id = %id, event_type = record.event_type(), "event appended");
        Ok(record)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<EventRecord>, StoreError> {
        let state = self.read()?;
        if !include_deleted && state.tombstones.contains_key(&id) {
            return Ok(None);
        }
        Ok(state.events.get(&id).cloned())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        if !state.events.contains_key(&id) {
            return Ok(false);
        }
        let deleted_at = self.clock.now_micros();
        state.tombstones.entry(id).or_insert(Tombstone {
            event_id: id,
            deleted_at,
        });
        debug!(event_id = %id, "event tombstoned");
        Ok(true)
    }

    async fn tombstone(&self, id: Uuid) -> Result<Option<Tombstone>, StoreError> {
        Ok(self.read()?.tombstones.get(&id).copied())
    }
}

#[async_trait]
impl EventReadStore for InMemoryEventStore {
    async fn find_by_criteria(
        &self,
        criteria: &Criteria,
    ) -> Result<Page<EventRecord>, StoreError> {
        criteria.validate()?;
        let state = self.read()?;

        let mut matching: Vec<&EventRecord> = state
            .events
            .values()
            .filter(|record| {
                criteria.include_deleted || !state.tombstones.contains_key(&record.id())
            })
            .filter(|record| {
                criteria
                    .after
                    .is_none_or(|cursor| record.cursor() > cursor.at_storage_precision())
            })
            .filter(|record| criteria.filters.iter().all(|f| matches(f, record)))
            .collect();

        let sorts = criteria.effective_sorts();
        matching.sort_by(|a, b| {
            sorts
                .iter()
                .map(|sort| {
                    let ord =
                        compare_fields(field_value(sort.field, a), field_value(sort.field, b));
                    match sort.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(criteria.pagination.offset()).unwrap_or(usize::MAX);
        let per_page = usize::try_from(criteria.pagination.per_page).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .collect();

        Ok(Page::new(items, total, criteria.pagination))
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldRef<'a> {
    Text(&'a str),
    Id(Uuid),
    Time(DateTime<Utc>),
}

fn field_value(field: EventField, record: &EventRecord) -> FieldRef<'_> {
    match field {
        EventField::Id => FieldRef::Id(record.id()),
        EventField::EventType => FieldRef::Text(record.event_type()),
        EventField::AggregateType => FieldRef::Text(record.aggregate_type()),
        EventField::AggregateId => FieldRef::Text(record.aggregate_id()),
        EventField::Timestamp => FieldRef::Time(record.timestamp()),
        EventField::CreatedAt => FieldRef::Time(record.created_at()),
    }
}

fn compare_fields(a: FieldRef<'_>, b: FieldRef<'_>) -> Ordering {
    match (a, b) {
        (FieldRef::Text(a), FieldRef::Text(b)) => a.cmp(b),
        (FieldRef::Id(a), FieldRef::Id(b)) => a.cmp(&b),
        (FieldRef::Time(a), FieldRef::Time(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

fn compare_operand(actual: FieldRef<'_>, operand: &FilterValue) -> Option<Ordering> {
    match (actual, operand) {
        (FieldRef::Text(a), FilterValue::Text(b)) => Some(a.cmp(b.as_str())),
        (FieldRef::Id(a), FilterValue::Id(b)) => Some(a.cmp(b)),
        (FieldRef::Time(a), FilterValue::Time(b)) => Some(a.cmp(&to_micros(*b))),
        _ => None,
    }
}

fn matches(filter: &Filter, record: &EventRecord) -> bool {
    let actual = field_value(filter.field, record);
    match (filter.operator, &filter.value) {
        (Operator::In, FilterValue::List(items)) => items
            .iter()
            .any(|item| compare_operand(actual, item) == Some(Ordering::Equal)),
        (operator, operand) => compare_operand(actual, operand).is_some_and(|ord| match operator {
            Operator::Eq | Operator::In => ord.is_eq(),
            Operator::Ne => ord.is_ne(),
            Operator::Gt => ord.is_gt(),
            Operator::Gte => ord.is_ge(),
            Operator::Lt => ord.is_lt(),
            Operator::Lte => ord.is_le(),
        }),
    }
}
