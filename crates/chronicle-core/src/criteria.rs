//! Criteria descriptor consumed by read-side adapters.
//!
//! A `Criteria` is a list of `(field, operator, value)` filters plus sorts and
//! pagination. Adapters translate it into a storage-specific query; this
//! module only defines its shape and validity rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::to_micros;
use crate::error::StoreError;
use crate::event::Cursor;

/// Default page size when the caller does not choose one.
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Upper bound on a single page.
pub const MAX_PER_PAGE: u32 = 10_000;

/// Event columns that can be filtered and sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventField {
    /// Event identifier.
    Id,
    /// Event type tag.
    #[serde(alias = "eventType")]
    EventType,
    /// Owning aggregate kind.
    #[serde(alias = "aggregateType")]
    AggregateType,
    /// Owning aggregate instance.
    #[serde(alias = "aggregateId")]
    AggregateId,
    /// Occurrence time.
    Timestamp,
    /// Append time.
    #[serde(alias = "createdAt")]
    CreatedAt,
}

/// The kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// A UUID.
    Id,
    /// A UTC timestamp.
    Time,
}

impl EventField {
    /// Returns the value kind this field accepts.
    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Id,
            Self::EventType | Self::AggregateType | Self::AggregateId => FieldKind::Text,
            Self::Timestamp | Self::CreatedAt => FieldKind::Time,
        }
    }

    /// Canonical field name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::EventType => "event_type",
            Self::AggregateType => "aggregate_type",
            Self::AggregateId => "aggregate_id",
            Self::Timestamp => "timestamp",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Member of a list.
    In,
}

/// A filter operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Free text.
    Text(String),
    /// A UUID.
    Id(Uuid),
    /// A UTC timestamp.
    Time(DateTime<Utc>),
    /// Operand list for [`Operator::In`].
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Interprets a raw JSON operand according to the field's kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the operand cannot be read as the
    /// field's kind.
    pub fn from_json(field: EventField, raw: &serde_json::Value) -> Result<Self, StoreError> {
        if let serde_json::Value::Array(items) = raw {
            return items
                .iter()
                .map(|item| match item {
                    serde_json::Value::Array(_) => Err(StoreError::Validation(format!(
                        "nested lists are not allowed for {}",
                        field.name()
                    ))),
                    other => Self::from_json(field, other),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List);
        }
        let text = raw.as_str().ok_or_else(|| {
            StoreError::Validation(format!("{} expects a string operand", field.name()))
        })?;
        match field.kind() {
            FieldKind::Text => Ok(Self::Text(text.to_owned())),
            FieldKind::Id => Uuid::parse_str(text).map(Self::Id).map_err(|e| {
                StoreError::Validation(format!("{} expects a uuid: {e}", field.name()))
            }),
            FieldKind::Time => DateTime::parse_from_rfc3339(text)
                .map(|t| Self::Time(to_micros(t.with_timezone(&Utc))))
                .map_err(|e| {
                    StoreError::Validation(format!(
                        "{} expects an RFC 3339 timestamp: {e}",
                        field.name()
                    ))
                }),
        }
    }

    fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Text(_) => Some(FieldKind::Text),
            Self::Id(_) => Some(FieldKind::Id),
            Self::Time(_) => Some(FieldKind::Time),
            Self::List(_) => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(to_micros(value))
    }
}

/// A single `(field, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Filtered column.
    pub field: EventField,
    /// Comparison operator.
    pub operator: Operator,
    /// Operand.
    pub value: FilterValue,
}

impl Filter {
    /// Creates a filter.
    #[must_use]
    pub fn new(field: EventField, operator: Operator, value: impl Into<FilterValue>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Equality filter.
    #[must_use]
    pub fn eq(field: EventField, value: impl Into<FilterValue>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Checks operator/operand compatibility.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` describing the mismatch.
    pub fn validate(&self) -> Result<(), StoreError> {
        let name = self.field.name();
        match (&self.operator, &self.value) {
            (Operator::In, FilterValue::List(items)) => {
                if items.is_empty() {
                    return Err(StoreError::Validation(format!(
                        "in filter on {name} needs at least one operand"
                    )));
                }
                for item in items {
                    self.check_kind(item)?;
                }
                Ok(())
            }
            (Operator::In, _) => Err(StoreError::Validation(format!(
                "in filter on {name} needs a list operand"
            ))),
            (_, FilterValue::List(_)) => Err(StoreError::Validation(format!(
                "list operand on {name} is only valid with the in operator"
            ))),
            (_, value) => self.check_kind(value),
        }
    }

    fn check_kind(&self, value: &FilterValue) -> Result<(), StoreError> {
        match value.kind() {
            Some(kind) if kind == self.field.kind() => Ok(()),
            _ => Err(StoreError::Validation(format!(
                "operand type does not match field {}",
                self.field.name()
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// A sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Sorted column.
    pub field: EventField,
    /// Direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on `field`.
    #[must_use]
    pub fn asc(field: EventField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub fn desc(field: EventField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// Number of items to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// Filter, sort and pagination descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Conjunction of predicates.
    pub filters: Vec<Filter>,
    /// Sort keys; empty means `timestamp ASC`.
    pub sorts: Vec<Sort>,
    /// Page selection.
    pub pagination: Pagination,
    /// Keyset seek: only records strictly after this `(timestamp, id)`
    /// position match.
    pub after: Option<Cursor>,
    /// Include tombstoned records.
    pub include_deleted: bool,
}

impl Criteria {
    /// Empty criteria: everything, first page, default order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Selects a page.
    #[must_use]
    pub fn paginate(mut self, page: u32, per_page: u32) -> Self {
        self.pagination = Pagination { page, per_page };
        self
    }

    /// Seeks past a cursor.
    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.after = cursor.map(Cursor::at_storage_precision);
        self
    }

    /// Opts into tombstoned records.
    #[must_use]
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// Checks pagination bounds and every filter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for the first invalid element.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.pagination.page == 0 {
            return Err(StoreError::Validation("page starts at 1".into()));
        }
        if self.pagination.per_page == 0 || self.pagination.per_page > MAX_PER_PAGE {
            return Err(StoreError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        self.filters.iter().try_for_each(Filter::validate)
    }

    /// Sort keys an adapter must apply: `timestamp ASC` by default, always
    /// ending with `id` so the order is total.
    #[must_use]
    pub fn effective_sorts(&self) -> Vec<Sort> {
        let mut sorts = if self.sorts.is_empty() {
            vec![Sort::asc(EventField::Timestamp)]
        } else {
            self.sorts.clone()
        };
        if !sorts.iter().any(|s| s.field == EventField::Id) {
            let direction = sorts.last().map_or(SortDirection::Asc, |s| s.direction);
            sorts.push(Sort {
                field: EventField::Id,
                direction,
            });
        }
        sorts
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: u64,
    /// Page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
    /// Number of pages.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assembles a page, deriving `total_pages`.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: total.div_ceil(per_page),
        }
    }

    /// Maps the items, keeping the page metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}
