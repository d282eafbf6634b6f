//! # Web API Response Types
//!
//! Response bodies and the error type every handler returns.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{FailureClass, KitchenError};
use crate::models::Order;
use crate::validation::{FieldError, ValidationErrors};

/// Body of `201 Created` from `POST /orders`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_number: String,
    pub status: String,
    pub total_amount: f64,
}

impl From<&Order> for CreateOrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.number.clone(),
            status: order.status.to_string(),
            total_amount: order.total_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl From<KitchenError> for ApiError {
    fn from(err: KitchenError) -> Self {
        match err {
            KitchenError::Validation(errors) => Self::Validation(errors),
            KitchenError::OrderNotFound(_) => Self::NotFound("Order not found".to_string()),
            KitchenError::WorkerNotFound(_) => Self::NotFound("Worker not found".to_string()),
            other => match other.failure_class() {
                FailureClass::TransientInfrastructure | FailureClass::Cancelled => {
                    error!(error = %other, "Request failed on unavailable infrastructure");
                    Self::ServiceUnavailable("Service temporarily unavailable".to_string())
                }
                _ => {
                    error!(error = %other, "Request failed");
                    Self::Internal
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidBody | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            errors: match self {
                ApiError::Validation(errors) => Some(errors.into_inner()),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
