//! # Order Intake Handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, warn};

use crate::models::OrderRequest;
use crate::web::response_types::{ApiError, ApiResult, CreateOrderResponse};
use crate::web::state::IntakeState;

/// `POST /orders`
pub async fn create_order(
    State(state): State<IntakeState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateOrderResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected order body");
        ApiError::InvalidBody
    })?;

    let order = state
        .orders
        .create_order(request, &state.shutdown)
        .await
        .map_err(|e| {
            if let crate::error::KitchenError::Validation(errors) = &e {
                warn!(errors = %errors, "Order validation failed");
            }
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(CreateOrderResponse::from(&order))))
}
