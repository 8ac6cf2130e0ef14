//! Per-request spans.
//!
//! Every log line emitted while serving a request, including those from its
//! deadline timer, carries the request's method, URI and request ID.

use axum::http::Request;
use ::tracing::Span;

use crate::http::request::RequestIdExt;

/// Span for one request, used with `TraceLayer::make_span_with`.
pub fn request_span<B>(request: &Request<B>) -> Span {
    ::tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request.request_id().unwrap_or("unknown"),
    )
}
