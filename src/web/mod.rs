//! # Web API Module
//!
//! Axum routers for order intake and order tracking. Both share the same
//! middleware stack: request ids, request tracing, panic recovery, and a
//! request timeout. Intake additionally caps concurrent requests.

pub mod handlers;
pub mod middleware;
pub mod response_types;
pub mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use middleware::{add_request_id, RequestSpan};
use state::{IntakeState, TrackingState};

pub use response_types::{ApiError, ApiResult};

pub fn create_intake_app(state: IntakeState, config: &WebConfig) -> Router {
    routes::intake_routes()
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests.max(1)))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new()))
        .layer(from_fn(add_request_id))
        .with_state(state)
}

pub fn create_tracking_app(state: TrackingState, config: &WebConfig) -> Router {
    routes::tracking_routes()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan::new()))
        .layer(from_fn(add_request_id))
        .with_state(state)
}

/// Serve `app` on `addr` until `shutdown` fires, then drain in-flight requests
pub async fn serve(app: Router, addr: &str, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "🌐 HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
