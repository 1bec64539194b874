//! Server-side span for every inbound request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::observability::metrics;
use crate::trace::{SpanKind, Status, Tracer};

/// Name of the span opened around each inbound request.
pub const SERVER_SPAN: &str = "http.request";

/// Continue (or start) the caller's trace, open a server span, and expose the
/// child [`TraceContext`](crate::trace::TraceContext) to handlers through
/// request extensions.
pub async fn trace_requests(State(tracer): State<Tracer>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let target = request.uri().path().to_string();

    let parent = tracer.extract(request.headers());
    let (ctx, mut span) = tracer.start_span_with_kind(&parent, SERVER_SPAN, SpanKind::Server);
    span.set_attribute("http.method", method.to_string());
    span.set_attribute("http.target", target);
    request.extensions_mut().insert(ctx);

    let response = next.run(request).await;

    let status = response.status();
    span.set_attribute("http.status_code", i64::from(status.as_u16()));
    if status.is_server_error() {
        span.set_status(Status::error(format!("http {}", status.as_u16())));
    } else {
        span.set_status(Status::Ok);
    }
    span.end();

    metrics::record_request(tracer.service(), method.as_str(), status.as_u16(), start);
    response
}
