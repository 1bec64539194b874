//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_requests_total` (counter): inbound requests by service, method, status
//! - `mesh_request_duration_seconds` (histogram): inbound latency by service
//! - `mesh_upstream_requests_total` (counter): outbound calls by backend, outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus endpoint is optional

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one inbound request.
pub fn record_request(service: &str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "mesh_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mesh_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one outbound call to a backend. `outcome` is a status code or an
/// error kind such as `timeout`.
pub fn record_upstream(backend: &str, outcome: &str) {
    metrics::counter!(
        "mesh_upstream_requests_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
