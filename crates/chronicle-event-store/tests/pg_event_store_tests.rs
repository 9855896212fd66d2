//! Integration tests for `PgEventStore`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::criteria::{Criteria, EventField, Filter, FilterValue, Operator, Sort};
use chronicle_core::error::StoreError;
use chronicle_core::event::NewEvent;
use chronicle_core::store::{EventReadStore, EventWriteStore};
use chronicle_event_store::pg_event_store::PgEventStore;
use chronicle_test_support::FixedClock;
use sqlx::PgPool;
use uuid::Uuid;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_768_000_000 + secs, 0).unwrap()
}

fn store(pool: PgPool) -> PgEventStore {
    PgEventStore::new(pool, Arc::new(FixedClock(at(10_000))))
}

/// Helper to build a `NewEvent` with sensible defaults.
fn make_new_event(event_type: &str, aggregate_id: &str, secs: i64) -> NewEvent {
    NewEvent {
        id: None,
        event_type: event_type.to_string(),
        aggregate_type: "order".to_string(),
        aggregate_id: aggregate_id.to_string(),
        payload: serde_json::json!({"key": "value"}),
        timestamp: at(secs),
    }
}

// --- append + find_by_id round-trip ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_and_find_by_id_round_trip(pool: PgPool) {
    let store = store(pool);

    let appended = store
        .append(make_new_event("order.placed", "order-1", 1))
        .await
        .unwrap();

    let loaded = store.find_by_id(appended.id(), false).await.unwrap();
    assert_eq!(loaded, Some(appended.clone()));
    assert_eq!(appended.created_at(), at(10_000));
    assert_eq!(appended.updated_at(), appended.created_at());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_id_returns_none_for_unknown_id(pool: PgPool) {
    let store = store(pool);

    let loaded = store.find_by_id(Uuid::now_v7(), true).await.unwrap();

    assert!(loaded.is_none());
}

// --- duplicate ids ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_id_fails_and_keeps_original(pool: PgPool) {
    let store = store(pool);
    let id = Uuid::now_v7();
    let original = store
        .append(make_new_event("order.placed", "order-1", 1).with_id(id))
        .await
        .unwrap();

    let result = store
        .append(make_new_event("order.cancelled", "order-9", 2).with_id(id))
        .await;

    match result {
        Err(StoreError::DuplicateId(dup)) => assert_eq!(dup, id),
        other => panic!("expected DuplicateId, got {other:?}"),
    }
    let loaded = store.find_by_id(id, false).await.unwrap();
    assert_eq!(loaded, Some(original));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_rejects_blank_aggregate_type(pool: PgPool) {
    let store = store(pool);
    let mut event = make_new_event("order.placed", "order-1", 1);
    event.aggregate_type = String::new();

    let result = store.append(event).await;

    assert!(matches!(result, Err(StoreError::Validation(_))));
}

// --- immutability ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_rows_reject_update_and_delete(pool: PgPool) {
    let store = store(pool.clone());
    let record = store
        .append(make_new_event("order.placed", "order-1", 1))
        .await
        .unwrap();

    let update = sqlx::query("UPDATE domain_events SET event_type = 'x' WHERE id = $1")
        .bind(record.id())
        .execute(&pool)
        .await;
    let delete = sqlx::query("DELETE FROM domain_events WHERE id = $1")
        .bind(record.id())
        .execute(&pool)
        .await;

    assert!(update.is_err());
    assert!(delete.is_err());
    assert_eq!(
        store.find_by_id(record.id(), false).await.unwrap(),
        Some(record)
    );
}

// --- soft delete ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_soft_delete_excludes_from_default_reads(pool: PgPool) {
    let store = store(pool);
    let record = store
        .append(make_new_event("order.placed", "order-1", 1))
        .await
        .unwrap();

    assert!(store.soft_delete(record.id()).await.unwrap());

    assert!(store.find_by_id(record.id(), false).await.unwrap().is_none());
    assert_eq!(
        store.find_by_id(record.id(), true).await.unwrap(),
        Some(record.clone())
    );
    let page = store.find_by_criteria(&Criteria::new()).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);

    let tombstone = store.tombstone(record.id()).await.unwrap().unwrap();
    assert_eq!(tombstone.event_id, record.id());
    assert_eq!(tombstone.deleted_at, at(10_000));

    let with_deleted = store
        .find_by_criteria(&Criteria::new().include_deleted(true))
        .await
        .unwrap();
    assert_eq!(with_deleted.items, vec![record]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_soft_delete_unknown_id_returns_false(pool: PgPool) {
    let store = store(pool);

    assert!(!store.soft_delete(Uuid::now_v7()).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_soft_delete_twice_returns_true(pool: PgPool) {
    let store = store(pool);
    let record = store
        .append(make_new_event("order.placed", "order-1", 1))
        .await
        .unwrap();

    assert!(store.soft_delete(record.id()).await.unwrap());
    assert!(store.soft_delete(record.id()).await.unwrap());
}

// --- criteria ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_criteria_filters_by_type_and_time_range(pool: PgPool) {
    let store = store(pool);
    let a = store.append(make_new_event("X", "order-1", 1)).await.unwrap();
    store.append(make_new_event("Y", "order-1", 2)).await.unwrap();
    let c = store.append(make_new_event("X", "order-1", 3)).await.unwrap();
    store.append(make_new_event("X", "order-1", 50)).await.unwrap();

    let criteria = Criteria::new()
        .filter(Filter::eq(EventField::EventType, "X"))
        .filter(Filter::new(EventField::Timestamp, Operator::Gte, at(0)))
        .filter(Filter::new(EventField::Timestamp, Operator::Lte, at(10)));

    let page = store.find_by_criteria(&criteria).await.unwrap();

    assert_eq!(page.items, vec![a, c]);
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_criteria_paginates_in_total_order(pool: PgPool) {
    let store = store(pool);
    let mut expected = Vec::new();
    for secs in 1..=5 {
        expected.push(
            store
                .append(make_new_event("X", &format!("order-{secs}"), secs))
                .await
                .unwrap(),
        );
    }

    let first = store
        .find_by_criteria(&Criteria::new().paginate(1, 2))
        .await
        .unwrap();
    let third = store
        .find_by_criteria(&Criteria::new().paginate(3, 2))
        .await
        .unwrap();

    assert_eq!(first.items, expected[0..2].to_vec());
    assert_eq!(third.items, expected[4..5].to_vec());
    assert_eq!(first.total_pages, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_criteria_seeks_and_breaks_ties_by_id(pool: PgPool) {
    let store = store(pool);
    let low = store
        .append(make_new_event("X", "a", 5).with_id(Uuid::from_u128(1)))
        .await
        .unwrap();
    let high = store
        .append(make_new_event("X", "b", 5).with_id(Uuid::from_u128(2)))
        .await
        .unwrap();

    let all = store.find_by_criteria(&Criteria::new()).await.unwrap();
    let after_low = store
        .find_by_criteria(&Criteria::new().after(Some(low.cursor())))
        .await
        .unwrap();

    assert_eq!(all.items, vec![low, high.clone()]);
    assert_eq!(after_low.items, vec![high]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_criteria_in_filter_and_descending_sort(pool: PgPool) {
    let store = store(pool);
    let a = store.append(make_new_event("X", "a", 1)).await.unwrap();
    store.append(make_new_event("X", "b", 2)).await.unwrap();
    let c = store.append(make_new_event("X", "c", 3)).await.unwrap();

    let criteria = Criteria::new()
        .filter(Filter::new(
            EventField::AggregateId,
            Operator::In,
            FilterValue::List(vec!["a".into(), "c".into()]),
        ))
        .sort(Sort::desc(EventField::Timestamp));

    let page = store.find_by_criteria(&criteria).await.unwrap();

    assert_eq!(page.items, vec![c, a]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_text_sort_uses_byte_order(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let lower = store.append(make_new_event("X", "order-a", 1)).await.unwrap();
    let upper = store.append(make_new_event("X", "Order-b", 2)).await.unwrap();
    let underscore = store.append(make_new_event("X", "order_c", 3)).await.unwrap();

    // Act
    let page = store
        .find_by_criteria(&Criteria::new().sort(Sort::asc(EventField::AggregateId)))
        .await
        .unwrap();

    // Assert
    assert_eq!(page.items, vec![upper, lower, underscore]);
}

// --- payload serialization ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_complex_json_payload_round_trip(pool: PgPool) {
    let store = store(pool);
    let complex_payload = serde_json::json!({
        "nested": {"key": "value", "number": 42},
        "array": [1, "two", null, true, false],
        "null_field": null,
        "empty_object": {},
        "empty_array": []
    });
    let mut event = make_new_event("X", "order-1", 1);
    event.payload = complex_payload.clone();

    let record = store.append(event).await.unwrap();

    let loaded = store.find_by_id(record.id(), false).await.unwrap().unwrap();
    assert_eq!(loaded.payload(), &complex_payload);
}

// --- timestamp precision ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_timestamp_precision(pool: PgPool) {
    let store = store(pool);
    let mut event = make_new_event("X", "order-1", 1);
    event.timestamp = at(1) + chrono::Duration::nanoseconds(123_456_789);

    let record = store.append(event).await.unwrap();

    // PostgreSQL TIMESTAMPTZ has microsecond precision.
    let loaded = store.find_by_id(record.id(), false).await.unwrap().unwrap();
    assert_eq!(loaded.timestamp(), record.timestamp());
    assert_eq!(
        loaded.timestamp().timestamp_micros(),
        at(1).timestamp_micros() + 123_456
    );
}
