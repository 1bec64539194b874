//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure shared by the
//! gateway and the backend services. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Route definitions mapping path prefixes to destinations.
    pub routes: Vec<RouteConfig>,

    /// Backend service definitions.
    pub backends: Vec<BackendConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Distributed trace export.
    pub telemetry: TelemetryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Backend service behaviour.
    pub services: ServicesConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: default_routes(),
            backends: default_backends(),
            timeouts: TimeoutConfig::default(),
            telemetry: TelemetryConfig::default(),
            observability: ObservabilityConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl MeshConfig {
    /// Look up a backend definition by name.
    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port. When unset, each service uses its default port.
    pub port: Option<u16>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

/// Handlers that run inside the gateway instead of being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalHandler {
    /// `GET /health`.
    Health,
    /// `GET /api/user/{id}/orders` aggregation.
    UserOrders,
}

/// Route configuration. Exactly one of `backend` and `handler` must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path prefix to match (segment-aligned).
    pub path_prefix: String,

    /// Backend to forward to.
    #[serde(default)]
    pub backend: Option<String>,

    /// Local handler to dispatch to.
    #[serde(default)]
    pub handler: Option<LocalHandler>,
}

impl RouteConfig {
    pub fn to_backend(name: &str, path_prefix: &str, backend: &str) -> Self {
        Self {
            name: name.to_string(),
            path_prefix: path_prefix.to_string(),
            backend: Some(backend.to_string()),
            handler: None,
        }
    }

    pub fn to_handler(name: &str, path_prefix: &str, handler: LocalHandler) -> Self {
        Self {
            name: name.to_string(),
            path_prefix: path_prefix.to_string(),
            backend: None,
            handler: Some(handler),
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Base URL (e.g., "http://user-service:3001").
    pub address: String,
}

impl BackendConfig {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::to_handler("health", "/health", LocalHandler::Health),
        RouteConfig::to_handler("user-orders", "/api/user", LocalHandler::UserOrders),
        RouteConfig::to_backend("users", "/api/users", "users"),
        RouteConfig::to_backend("orders", "/api/orders", "orders"),
        RouteConfig::to_backend("inventory", "/api/inventory", "inventory"),
    ]
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new("users", "http://user-service:3001"),
        BackendConfig::new("orders", "http://order-service:3002"),
        BackendConfig::new("inventory", "http://inventory-service:3003"),
    ]
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Budget for handling one inbound request in seconds. Must exceed
    /// `request_secs` so upstream timeouts surface as gateway errors.
    pub server_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 2,
            request_secs: 5,
            server_secs: 10,
        }
    }
}

/// Span export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Export spans to the collector. Context propagation happens regardless.
    pub enabled: bool,

    /// Collector address, `host:port` or a full URL.
    pub endpoint: String,

    /// Use plain HTTP for scheme-less endpoints.
    pub insecure: bool,

    /// Fraction of new root traces that are sampled (0.0..=1.0).
    pub sample_ratio: f64,

    /// Ended spans buffered before new ones are dropped.
    pub max_queue_size: usize,

    /// Maximum spans per export request.
    pub max_export_batch_size: usize,

    /// Interval between scheduled exports in milliseconds.
    pub scheduled_delay_ms: u64,

    /// Timeout of a single export request in seconds.
    pub export_timeout_secs: u64,

    /// Bound on the shutdown flush in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "otel-collector.observability.svc.cluster.local:4318".to_string(),
            insecure: true,
            sample_ratio: 1.0,
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5000,
            export_timeout_secs: 10,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Backend service behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Upper bound of the simulated processing delay. 0 disables it.
    pub simulated_latency_ms: u64,

    /// Backend holding users (order verification, aggregation).
    pub user_backend: String,

    /// Backend holding orders (aggregation).
    pub order_backend: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: 100,
            user_backend: "users".to_string(),
            order_backend: "orders".to_string(),
        }
    }
}
