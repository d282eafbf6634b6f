//! # Web API Application State

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::services::{OrderService, TrackingService};

/// Shared state of the intake router
#[derive(Clone, Debug)]
pub struct IntakeState {
    pub orders: Arc<OrderService>,
    /// Process shutdown signal; aborts publish retries of in-flight requests
    pub shutdown: CancellationToken,
}

impl IntakeState {
    pub fn new(orders: Arc<OrderService>, shutdown: CancellationToken) -> Self {
        Self { orders, shutdown }
    }
}

/// Shared state of the tracking router
#[derive(Clone, Debug)]
pub struct TrackingState {
    pub tracking: Arc<TrackingService>,
}

impl TrackingState {
    pub fn new(tracking: Arc<TrackingService>) -> Self {
        Self { tracking }
    }
}
