//! # Web API Route Definitions

use axum::routing::{get, post};
use axum::Router;

use crate::constants::modes;
use crate::web::handlers;
use crate::web::state::{IntakeState, TrackingState};

pub fn intake_routes() -> Router<IntakeState> {
    Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route(
            "/health",
            get(|| handlers::health::health_check(modes::ORDER_SERVICE)),
        )
}

pub fn tracking_routes() -> Router<TrackingState> {
    Router::new()
        .route(
            "/orders/{number}/status",
            get(handlers::tracking::get_order_status),
        )
        .route(
            "/orders/{number}/history",
            get(handlers::tracking::get_order_history),
        )
        .route(
            "/workers/status",
            get(handlers::tracking::get_workers_status),
        )
        .route(
            "/health",
            get(|| handlers::health::health_check(modes::TRACKING_SERVICE)),
        )
}
