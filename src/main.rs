//! tracemesh
//!
//! One binary, four roles: the API gateway and the user, order and
//! inventory services.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                 API GATEWAY                  │
//!   Client Request     │  ┌────────────┐   ┌─────────┐   ┌─────────┐  │
//!   ───────────────────┼─▶│ trace ctx  │──▶│ routing │──▶│ forward │──┼──▶ user / order /
//!                      │  │ server span│   │  table  │   └─────────┘  │    inventory service
//!                      │  └────────────┘   └────┬────┘                │
//!                      │                        ▼                     │
//!                      │                  ┌───────────┐               │
//!                      │                  │ aggregate │───────────────┼──▶ users + orders
//!                      │                  └───────────┘               │    (concurrent)
//!                      │                                              │
//!                      │  ended spans ─▶ queue ─▶ batch worker ───────┼──▶ OTLP collector
//!                      └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tracemesh::config::load_config;
use tracemesh::lifecycle::{signals, startup, Role, Shutdown};
use tracemesh::observability::logging;
use tracemesh::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "tracemesh", version, about = "Traced API gateway and backend services")]
struct Cli {
    /// Configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long, env = "TRACEMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding config and `PORT`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Which service to run.
    #[arg(value_enum)]
    role: Role,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let service = cli.role.service_name();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.listener.port = Some(port);
    }

    logging::init_logging(&config.observability, service)?;
    tracing::info!(service = service, version = env!("CARGO_PKG_VERSION"), "Starting");

    startup::init_metrics(&config);
    let tracer = startup::build_tracer(service, &config.telemetry)?;
    let server = HttpServer::new(cli.role, &config, tracer.clone())?;
    let listener = startup::bind(cli.role, &config).await?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(signals::wait_for_shutdown(shutdown));
    server.run(listener, shutdown_rx).await?;

    let flush_timeout = Duration::from_secs(config.telemetry.shutdown_timeout_secs);
    if let Err(e) = tracer.shutdown(flush_timeout).await {
        tracing::warn!(error = %e, "Span flush incomplete");
    }

    tracing::info!(service = service, "Shutdown complete");
    Ok(())
}
