//! Startup orchestration.
//!
//! # Responsibilities
//! - Name each runnable role and its default port
//! - Build the tracer from telemetry configuration
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Telemetry can be disabled; context propagation still works
//! - Listeners start last (traffic only when ready)

use clap::ValueEnum;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, MeshConfig, TelemetryConfig};
use crate::http::server::ServerError;
use crate::trace::export::{otlp_provider, ExportError};
use crate::trace::Tracer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] ExportError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which process this binary runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    Gateway,
    Users,
    Orders,
    Inventory,
}

impl Role {
    /// Service name reported in spans, logs and health checks.
    pub fn service_name(&self) -> &'static str {
        match self {
            Role::Gateway => "api-gateway",
            Role::Users => "user-service",
            Role::Orders => "order-service",
            Role::Inventory => "inventory-service",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Role::Gateway => 3000,
            Role::Users => 3001,
            Role::Orders => 3002,
            Role::Inventory => 3003,
        }
    }
}

/// Build the tracer for `service`.
pub fn build_tracer(service: &str, config: &TelemetryConfig) -> Result<Tracer, StartupError> {
    if !config.enabled {
        tracing::info!(service = service, "Span export disabled");
        return Ok(Tracer::noop(service));
    }
    let provider = otlp_provider(service, config)?;
    Ok(Tracer::new(service, provider))
}

/// Bind the listener for `role`; the configured port wins over the default.
pub async fn bind(role: Role, config: &MeshConfig) -> Result<TcpListener, StartupError> {
    let port = config.listener.port.unwrap_or_else(|| role.default_port());
    let addr = format!("{}:{}", config.listener.host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// Install the Prometheus endpoint when enabled.
pub fn init_metrics(config: &MeshConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => crate::observability::metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}
