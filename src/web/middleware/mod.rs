//! # Web Middleware
//!
//! Request ids and the per-request tracing span. `RequestSpan` parents each
//! request span on the span that was current when the router was built, so
//! request logs keep the process-wide `service` fields even though the server
//! runs each connection on its own task.

pub mod request_id;

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

pub use request_id::{add_request_id, RequestId, REQUEST_ID_HEADER};

#[derive(Debug, Clone)]
pub struct RequestSpan {
    parent: Span,
}

impl RequestSpan {
    pub fn new() -> Self {
        Self {
            parent: Span::current(),
        }
    }
}

impl Default for RequestSpan {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        // Set by add_request_id, which runs outside the trace layer
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(RequestId::as_str)
            .unwrap_or("-");

        tracing::info_span!(
            parent: &self.parent,
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}
