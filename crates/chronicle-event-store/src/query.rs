//! Criteria to SQL translation.
//!
//! Every operand is bound as a parameter; only column names and operators,
//! all drawn from closed enums, are pushed as SQL text.

use chrono::{DateTime, Utc};
use chronicle_core::clock::to_micros;
use chronicle_core::criteria::{
    Criteria, EventField, FieldKind, Filter, FilterValue, Operator, SortDirection,
};
use chronicle_core::error::StoreError;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::schema::{EVENTS_TABLE, TOMBSTONES_TABLE};

pub(crate) const EVENT_COLUMNS: &str =
    r#"e.id, e.event_type, e.aggregate_type, e.aggregate_id, e.payload, e."timestamp", e.created_at, e.updated_at"#;

fn column(field: EventField) -> &'static str {
    match field {
        EventField::Id => "e.id",
        EventField::EventType => "e.event_type",
        EventField::AggregateType => "e.aggregate_type",
        EventField::AggregateId => "e.aggregate_id",
        EventField::Timestamp => r#"e."timestamp""#,
        EventField::CreatedAt => "e.created_at",
    }
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq | Operator::In => " = ",
        Operator::Ne => " <> ",
        Operator::Gt => " > ",
        Operator::Gte => " >= ",
        Operator::Lt => " < ",
        Operator::Lte => " <= ",
    }
}

fn from_clause() -> String {
    format!(
        "FROM {EVENTS_TABLE} e LEFT JOIN {TOMBSTONES_TABLE} t ON t.event_id = e.id WHERE TRUE"
    )
}

/// `SELECT` of one page of matching rows.
pub(crate) fn select_page(
    criteria: &Criteria,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut qb = QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} {}", from_clause()));
    push_predicates(&mut qb, criteria)?;

    qb.push(" ORDER BY ");
    let mut order = qb.separated(", ");
    for sort in criteria.effective_sorts() {
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        order.push(format!("{} {direction}", column(sort.field)));
    }

    let offset = i64::try_from(criteria.pagination.offset()).unwrap_or(i64::MAX);
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(criteria.pagination.per_page));
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    Ok(qb)
}

/// `SELECT COUNT(*)` over every matching row, ignoring pagination.
pub(crate) fn count(criteria: &Criteria) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) {}", from_clause()));
    push_predicates(&mut qb, criteria)?;
    Ok(qb)
}

fn push_predicates(
    qb: &mut QueryBuilder<'static, Postgres>,
    criteria: &Criteria,
) -> Result<(), StoreError> {
    if !criteria.include_deleted {
        qb.push(" AND t.event_id IS NULL");
    }
    for filter in &criteria.filters {
        push_filter(qb, filter)?;
    }
    if let Some(cursor) = criteria.after {
        qb.push(r#" AND (e."timestamp", e.id) > ("#);
        qb.push_bind(to_micros(cursor.timestamp));
        qb.push(", ");
        qb.push_bind(cursor.id);
        qb.push(")");
    }
    Ok(())
}

fn push_filter(
    qb: &mut QueryBuilder<'static, Postgres>,
    filter: &Filter,
) -> Result<(), StoreError> {
    qb.push(" AND ");
    qb.push(column(filter.field));
    qb.push(comparison(filter.operator));
    match (&filter.operator, &filter.value) {
        (Operator::In, FilterValue::List(items)) => {
            qb.push("ANY(");
            push_list(qb, filter.field, items)?;
            qb.push(")");
        }
        (Operator::In, _) | (_, FilterValue::List(_)) => {
            return Err(StoreError::Validation(format!(
                "invalid operand for {}",
                filter.field.name()
            )));
        }
        (_, FilterValue::Text(text)) => {
            qb.push_bind(text.clone());
        }
        (_, FilterValue::Id(id)) => {
            qb.push_bind(*id);
        }
        (_, FilterValue::Time(time)) => {
            qb.push_bind(to_micros(*time));
        }
    }
    Ok(())
}

fn push_list(
    qb: &mut QueryBuilder<'static, Postgres>,
    field: EventField,
    items: &[FilterValue],
) -> Result<(), StoreError> {
    let mismatch = || StoreError::Validation(format!("mixed operand list for {}", field.name()));
    match field.kind() {
        FieldKind::Text => {
            let values = items
                .iter()
                .map(|v| match v {
                    FilterValue::Text(text) => Ok(text.clone()),
                    _ => Err(mismatch()),
                })
                .collect::<Result<Vec<String>, _>>()?;
            qb.push_bind(values);
        }
        FieldKind::Id => {
            let values = items
                .iter()
                .map(|v| match v {
                    FilterValue::Id(id) => Ok(*id),
                    _ => Err(mismatch()),
                })
                .collect::<Result<Vec<Uuid>, _>>()?;
            qb.push_bind(values);
        }
        FieldKind::Time => {
            let values = items
                .iter()
                .map(|v| match v {
                    FilterValue::Time(time) => Ok(to_micros(*time)),
                    _ => Err(mismatch()),
                })
                .collect::<Result<Vec<DateTime<Utc>>, _>>()?;
            qb.push_bind(values);
        }
    }
    Ok(())
}
