//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::http::{HeaderMap, Method, Uri};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracemesh::config::{BackendConfig, MeshConfig};
use tracemesh::lifecycle::{Role, Shutdown};
use tracemesh::observability::logging;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use tracemesh::trace::export::sampler;
use tracemesh::trace::{SpanId, Status, Tracer, Value as AttrValue};
use tracemesh::HttpServer;

/// Base config for tests: no simulated latency, loopback only.
pub fn test_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.services.simulated_latency_ms = 0;
    config.timeouts.connect_secs = 1;
    config.timeouts.request_secs = 2;
    config
}

pub fn set_backend(config: &mut MeshConfig, name: &str, addr: SocketAddr) {
    let address = format!("http://{}", addr);
    match config.backends.iter_mut().find(|b| b.name == name) {
        Some(backend) => backend.address = address,
        None => config.backends.push(BackendConfig::new(name, &address)),
    }
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A tracer sampling everything and exporting synchronously into `exporter`.
pub fn tracer(service: &str, exporter: &InMemorySpanExporter) -> Tracer {
    let provider = SdkTracerProvider::builder()
        .with_sampler(sampler(1.0))
        .with_simple_exporter(exporter.clone())
        .build();
    Tracer::new(service, provider)
}

/// Start `role` on an ephemeral port.
pub async fn start_service(role: Role, config: &MeshConfig, tracer: Tracer, shutdown: &Shutdown) -> SocketAddr {
    let server = HttpServer::new(role, config, tracer).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    addr
}

/// Gateway plus the three services, all exporting to one in-memory sink.
pub struct Mesh {
    pub gateway: SocketAddr,
    pub users: SocketAddr,
    pub orders: SocketAddr,
    pub inventory: SocketAddr,
    pub exporter: InMemorySpanExporter,
    pub tracers: Vec<Tracer>,
    pub shutdown: Shutdown,
}

impl Mesh {
    pub async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(mut config: MeshConfig) -> Self {
        logging::init_test_logging();
        let exporter = InMemorySpanExporter::default();
        let shutdown = Shutdown::new();
        let mut tracers = Vec::new();

        let mut spawn = |role: Role| {
            let t = tracer(role.service_name(), &exporter);
            tracers.push(t.clone());
            t
        };

        let users = start_service(Role::Users, &config, spawn(Role::Users), &shutdown).await;
        set_backend(&mut config, "users", users);
        let orders = start_service(Role::Orders, &config, spawn(Role::Orders), &shutdown).await;
        set_backend(&mut config, "orders", orders);
        let inventory = start_service(Role::Inventory, &config, spawn(Role::Inventory), &shutdown).await;
        set_backend(&mut config, "inventory", inventory);
        let gateway = start_service(Role::Gateway, &config, spawn(Role::Gateway), &shutdown).await;

        Self {
            gateway,
            users,
            orders,
            inventory,
            exporter,
            tracers,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway, path)
    }

    /// Export every span ended so far.
    pub async fn flush(&self) -> Vec<SpanData> {
        for tracer in &self.tracers {
            tracer.force_flush(Duration::from_secs(2)).await.unwrap();
        }
        self.exporter.get_finished_spans().unwrap()
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    let app = Router::new().fallback(|method: Method, uri: Uri, headers: HeaderMap, body: String| async move {
        let headers: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
            .collect();
        axum::Json(json!({
            "method": method.as_str(),
            "uri": uri.to_string(),
            "headers": headers,
            "body": body,
        }))
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Spans of one trace, in export order.
pub fn trace_of<'a>(spans: &'a [SpanData], trace_id: &str) -> Vec<&'a SpanData> {
    spans
        .iter()
        .filter(|s| s.span_context.trace_id().to_string() == trace_id)
        .collect()
}

pub fn spans_named<'a>(spans: &'a [SpanData], name: &str) -> Vec<&'a SpanData> {
    spans.iter().filter(|s| s.name == name).collect()
}

/// Latest value recorded for `key`.
pub fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a AttrValue> {
    span.attributes
        .iter()
        .rev()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn is_error(span: &SpanData) -> bool {
    matches!(span.status, Status::Error { .. })
}

/// Error description of a failed span.
pub fn error_message(span: &SpanData) -> Option<&str> {
    match &span.status {
        Status::Error { description } => Some(&**description),
        _ => None,
    }
}

/// Service that recorded the span.
pub fn service_of(span: &SpanData) -> &str {
    span.instrumentation_scope.name()
}

pub fn parent(span: &SpanData) -> Option<SpanId> {
    (span.parent_span_id != SpanId::INVALID).then_some(span.parent_span_id)
}

pub fn span_id(span: &SpanData) -> SpanId {
    span.span_context.span_id()
}
