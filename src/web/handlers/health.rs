//! # Health Check Handlers

use axum::Json;
use chrono::Utc;

use crate::web::response_types::HealthResponse;

/// `GET /health`: the process is up and serving
pub async fn health_check(service: &'static str) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: service.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
