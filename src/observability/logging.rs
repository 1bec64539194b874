//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for a service process
//! - Configure the log level from `RUST_LOG` or the config file
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Log lines carry the service name so co-located services stay readable

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Initialize logging for `service`.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
    service: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},tracemesh={level},tower_http={level}",
            level = config.log_level
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;

    tracing::info!(service = service, log_level = %config.log_level, "Logging initialized");
    Ok(())
}

/// Initialize logging for tests (errors only, captured by the test harness).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
