//! # Web API Integration Tests
//!
//! Drives the intake and tracking routers in-process with
//! `tower::ServiceExt::oneshot`; no sockets involved.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use kitchen_core::config::WebConfig;
use kitchen_core::messaging::OrderMessage;
use kitchen_core::models::Specialization;
use kitchen_core::web::state::{IntakeState, TrackingState};
use kitchen_core::web::{create_intake_app, create_tracking_app};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn intake_app(harness: &KitchenHarness) -> Router {
    let state = IntakeState::new(Arc::new(harness.order_service()), CancellationToken::new());
    create_intake_app(state, &WebConfig::default())
}

fn tracking_app(harness: &KitchenHarness) -> Router {
    let state = TrackingState::new(Arc::new(harness.tracking_service()));
    create_tracking_app(state, &WebConfig::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn test_create_order_returns_created() {
    let harness = KitchenHarness::new();
    harness.declare_work_topology().await;

    let body = OrderRequestBuilder::dine_in(4)
        .item("Lasagne", 2, 30.0)
        .item("Tiramisu", 1, 15.5)
        .json();
    let (status, body) = send(intake_app(&harness), post_json("/orders", body.to_string())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "received");
    assert_eq!(body["total_amount"], 75.5);
    let number = body["order_number"].as_str().unwrap();
    assert!(number.starts_with("ORD_"));
    assert!(number.ends_with("_001"));

    let published = harness.broker.drain_queue(KITCHEN_QUEUE);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].routing_key, "kitchen.dine_in.5");
    let message = OrderMessage::from_bytes(&published[0].payload).unwrap();
    assert_eq!(message.order_number, number);
}

#[tokio::test]
async fn test_validation_errors_are_listed_per_field() {
    let harness = KitchenHarness::new();
    let body = json!({
        "customer_name": "R2-D2",
        "order_type": "delivery",
        "table_number": 9,
        "items": [{"name": "Bolts", "quantity": 11, "price": 0.0}]
    });

    let (status, body) = send(intake_app(&harness), post_json("/orders", body.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");

    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    for expected in [
        "customer_name",
        "table_number",
        "delivery_address",
        "items[0].quantity",
        "items[0].price",
    ] {
        assert!(fields.contains(&expected), "missing {expected} in {fields:?}");
    }
    assert_eq!(harness.orders.order_count(), 0);
}

#[tokio::test]
async fn test_sub_cent_price_is_rejected_before_pricing() {
    let harness = KitchenHarness::new();
    harness.declare_work_topology().await;
    let body = OrderRequestBuilder::takeout()
        .item("Truffle Pasta", 2, 50.004)
        .json();

    let (status, body) = send(intake_app(&harness), post_json("/orders", body.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "items[0].price");
    assert_eq!(
        body["errors"][0]["message"],
        "item price must have at most 2 decimal places"
    );
    assert_eq!(harness.orders.order_count(), 0);
    assert_eq!(harness.broker.queue_depth(KITCHEN_QUEUE), 0);
}

#[tokio::test]
async fn test_unparseable_body_is_bad_request() {
    let harness = KitchenHarness::new();

    let (status, body) = send(intake_app(&harness), post_json("/orders", "{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(body.get("errors").is_none());

    let (status, _) = send(
        intake_app(&harness),
        post_json("/orders", json!({"customer_name": "Ann"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_broker_is_service_unavailable() {
    let harness = KitchenHarness::new();
    harness.broker.fail_next_channel_opens(10);

    let body = OrderRequestBuilder::takeout().json();
    let (status, body) = send(intake_app(&harness), post_json("/orders", body.to_string())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service temporarily unavailable");

    // Persisted before the publish was attempted
    assert_eq!(harness.orders.order_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tracking_endpoints() {
    let harness = KitchenHarness::new();
    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;
    let service = harness.kitchen_service("chef_anna", Specialization::general());
    service.start(CancellationToken::new()).await.unwrap();
    service
        .process_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap();

    let (status, body) = send(
        tracking_app(&harness),
        get(&format!("/orders/{}/status", order.number)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], order.number.as_str());
    assert_eq!(body["current_status"], "ready");
    assert_eq!(body["processed_by"], "chef_anna");
    assert!(body["estimated_completion"].is_null());

    let (status, body) = send(
        tracking_app(&harness),
        get(&format!("/orders/{}/history", order.number)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["received", "cooking", "ready"]);

    let (status, body) = send(tracking_app(&harness), get("/workers/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["worker_name"], "chef_anna");
    assert_eq!(body[0]["status"], "online");
    assert_eq!(body[0]["orders_processed"], 1);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let harness = KitchenHarness::new();

    for path in ["/orders/ORD_20240115_404/status", "/orders/ORD_20240115_404/history"] {
        let (status, body) = send(tracking_app(&harness), get(path)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Order not found");
    }
}

#[tokio::test]
async fn test_every_response_carries_a_request_id() {
    let harness = KitchenHarness::new();

    let first = intake_app(&harness).oneshot(get("/health")).await.unwrap();
    let second = tracking_app(&harness)
        .oneshot(get("/orders/ORD_20240115_404/status"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);

    let first_id = first.headers()["x-request-id"].to_str().unwrap().to_string();
    let second_id = second.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(first_id.len(), 36, "generated ids are uuids: {first_id}");
    assert_ne!(first_id, second_id);

    let echoed = intake_app(&harness)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "upstream-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(echoed.headers()["x-request-id"], "upstream-7");
}

#[tokio::test]
async fn test_health_endpoints_name_their_service() {
    let harness = KitchenHarness::new();

    let (status, body) = send(intake_app(&harness), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "order-service");

    let (status, body) = send(tracking_app(&harness), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "tracking-service");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let harness = KitchenHarness::new();
    let response = intake_app(&harness)
        .oneshot(get("/workers/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
