//! Integration tests for the events routes over the in-memory store.

mod common;

use axum::http::StatusCode;
use uuid::Uuid;

#[tokio::test]
async fn test_append_returns_201_with_event_view() {
    // Arrange
    let app = common::build_test_app();
    let id = Uuid::now_v7();

    // Act
    let (status, json) = common::post_json(
        &app,
        "/api/v1/events",
        &serde_json::json!({
            "id": id,
            "event_type": "OrderPlaced",
            "aggregate_type": "order",
            "aggregate_id": "order-1",
            "payload": {"total": 42},
            "timestamp": "2026-01-15T09:00:00Z"
        }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["payload"]["total"], 42);
    assert_eq!(json["timestamp"], "2026-01-15T09:00:00Z");
    assert_eq!(json["created_at"], "2026-01-15T10:00:00Z");
    assert_eq!(json["updated_at"], json["created_at"]);
    assert!(json["deleted_at"].is_null());
}

#[tokio::test]
async fn test_append_duplicate_id_returns_409() {
    let app = common::build_test_app();
    let body = serde_json::json!({
        "id": Uuid::now_v7(),
        "event_type": "OrderPlaced",
        "aggregate_type": "order",
        "aggregate_id": "order-1",
        "timestamp": "2026-01-15T09:00:00Z"
    });
    let (first, _) = common::post_json(&app, "/api/v1/events", &body).await;

    let (status, json) = common::post_json(&app, "/api/v1/events", &body).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "duplicate_id");
}

#[tokio::test]
async fn test_append_blank_event_type_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/events",
        &serde_json::json!({
            "event_type": " ",
            "aggregate_type": "order",
            "aggregate_id": "order-1",
            "timestamp": "2026-01-15T09:00:00Z"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_get_unknown_event_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(&app, &format!("/api/v1/events/{}", Uuid::now_v7())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "event_not_found");
}

#[tokio::test]
async fn test_soft_delete_hides_event_unless_included() {
    // Arrange
    let app = common::build_test_app();
    let id = common::append(&app, "OrderPlaced", "order-1", "2026-01-15T09:00:00Z").await;
    let uri = format!("/api/v1/events/{id}");

    // Act
    let deleted = common::delete(&app, &uri).await;
    let deleted_again = common::delete(&app, &uri).await;

    // Assert
    assert_eq!(deleted, StatusCode::NO_CONTENT);
    assert_eq!(deleted_again, StatusCode::NO_CONTENT);

    let (hidden, _) = common::get_json(&app, &uri).await;
    assert_eq!(hidden, StatusCode::NOT_FOUND);

    let (status, json) = common::get_json(&app, &format!("{uri}?include_deleted=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);
    assert_eq!(json["deleted_at"], "2026-01-15T10:00:00Z");

    let (_, listing) =
        common::post_json(&app, "/api/v1/events/query", &serde_json::json!({})).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn test_delete_unknown_event_returns_404() {
    let app = common::build_test_app();

    let status = common::delete(&app, &format!("/api/v1/events/{}", Uuid::now_v7())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_filters_sorts_and_paginates() {
    // Arrange
    let app = common::build_test_app();
    let a = common::append(&app, "OrderPlaced", "order-1", "2026-01-15T09:00:01Z").await;
    common::append(&app, "OrderShipped", "order-1", "2026-01-15T09:00:02Z").await;
    let c = common::append(&app, "OrderPlaced", "order-2", "2026-01-15T09:00:03Z").await;
    let d = common::append(&app, "OrderPlaced", "order-3", "2026-01-15T09:00:04Z").await;

    // Act
    let (status, json) = common::post_json(
        &app,
        "/api/v1/events/query",
        &serde_json::json!({
            "filters": [
                {"field": "event_type", "operator": "eq", "value": "OrderPlaced"},
                {"field": "timestamp", "operator": "lte", "value": "2026-01-15T09:00:03Z"}
            ],
            "per_page": 1,
            "page": 2
        }),
    )
    .await;
    let (_, desc) = common::post_json(
        &app,
        "/api/v1/events/query",
        &serde_json::json!({
            "filters": [{"field": "aggregate_id", "operator": "in", "value": ["order-1", "order-3"]}],
            "sorts": [{"field": "timestamp", "direction": "desc"}]
        }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["page"], 2);
    assert_eq!(json["per_page"], 1);
    assert_eq!(json["items"][0]["id"], c);

    let ids: Vec<&str> = desc["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], d);
    assert_eq!(ids[2], a);
}

#[tokio::test]
async fn test_query_with_malformed_operand_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/events/query",
        &serde_json::json!({
            "filters": [{"field": "timestamp", "operator": "gte", "value": "yesterday"}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}
