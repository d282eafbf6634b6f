//! # Log Context Tests
//!
//! Records emitted from spawned worker tasks and per-connection HTTP tasks
//! must still carry the process `service` fields, and request records their
//! request id.

mod common;

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use common::*;
use kitchen_core::config::WebConfig;
use kitchen_core::logging::service_span;
use kitchen_core::models::Specialization;
use kitchen_core::state_machine::OrderStatus;
use kitchen_core::web::create_tracking_app;
use kitchen_core::web::state::TrackingState;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::Instrument;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn records(&self) -> Vec<Value> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn span_field<'a>(record: &'a Value, span: &str, field: &str) -> Option<&'a Value> {
    record["spans"]
        .as_array()?
        .iter()
        .find(|s| s["name"] == span)
        .and_then(|s| s.get(field))
}

#[tokio::test(start_paused = true)]
async fn test_worker_records_carry_service_fields() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let harness = KitchenHarness::new();
    harness.declare_work_topology().await;

    let service = Arc::new(harness.kitchen_service("chef_anna", Specialization::general()));
    let consumer = harness.consumer();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let worker = tokio::spawn(
        async move { service.run(&consumer, token).await }
            .instrument(service_span("kitchen-worker")),
    );
    harness.wait_for_consumers(1).await;

    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;
    harness.wait_for_status(&order.number, OrderStatus::Ready).await;
    cancel.cancel();
    worker.await.unwrap().unwrap();

    let status_changes: Vec<Value> = logs
        .records()
        .into_iter()
        .filter(|r| r["fields"]["operation"] == "status_change")
        .collect();
    assert_eq!(status_changes.len(), 2, "cooking and ready");
    for record in &status_changes {
        assert_eq!(
            span_field(record, "service", "service"),
            Some(&Value::from("kitchen-worker")),
            "{record}"
        );
        assert!(span_field(record, "service", "hostname").is_some());
    }
}

#[tokio::test]
async fn test_request_records_carry_request_id_and_service() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let harness = KitchenHarness::new();
    let app = {
        let _entered = service_span("tracking-service").entered();
        create_tracking_app(
            TrackingState::new(Arc::new(harness.tracking_service())),
            &WebConfig::default(),
        )
    };

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let records = logs.records();
    let request_record = records
        .iter()
        .find(|r| span_field(r, "request", "request_id").is_some())
        .expect("a record inside the request span");
    assert_eq!(
        span_field(request_record, "request", "request_id"),
        Some(&Value::from("req-42"))
    );
    assert_eq!(
        span_field(request_record, "service", "service"),
        Some(&Value::from("tracking-service"))
    );
}
