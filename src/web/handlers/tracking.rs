//! # Tracking Handlers

use axum::extract::{Path, State};
use axum::Json;

use crate::services::{OrderStatusView, StatusHistoryEntry, WorkerStatusView};
use crate::web::response_types::ApiResult;
use crate::web::state::TrackingState;

/// `GET /orders/{number}/status`
pub async fn get_order_status(
    State(state): State<TrackingState>,
    Path(number): Path<String>,
) -> ApiResult<Json<OrderStatusView>> {
    Ok(Json(state.tracking.get_order_status(&number).await?))
}

/// `GET /orders/{number}/history`
pub async fn get_order_history(
    State(state): State<TrackingState>,
    Path(number): Path<String>,
) -> ApiResult<Json<Vec<StatusHistoryEntry>>> {
    Ok(Json(state.tracking.get_order_history(&number).await?))
}

/// `GET /workers/status`
pub async fn get_workers_status(
    State(state): State<TrackingState>,
) -> ApiResult<Json<Vec<WorkerStatusView>>> {
    Ok(Json(state.tracking.get_workers_status().await?))
}
