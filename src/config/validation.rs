//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (timeouts > 0, sample ratio)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MeshConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{LocalHandler, MeshConfig};
use crate::routing::matcher::normalize_prefix;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut backend_names = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if !backend_names.insert(backend.name.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate backend name '{}'", backend.name)));
        }
        match Url::parse(&backend.address) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(&field, format!("address '{}' must be an http(s) URL", backend.address))),
            Err(e) => errors.push(ValidationError::new(&field, format!("invalid address '{}': {}", backend.address, e))),
        }
    }

    let mut prefixes = HashSet::new();
    let mut aggregates = false;
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(&field, format!("path_prefix '{}' must start with '/'", route.path_prefix)));
        }
        if !prefixes.insert(normalize_prefix(&route.path_prefix)) {
            errors.push(ValidationError::new(&field, format!("path_prefix '{}' is already routed", route.path_prefix)));
        }
        match (&route.backend, route.handler) {
            (Some(backend), None) => {
                if !backend_names.contains(backend.as_str()) {
                    errors.push(ValidationError::new(&field, format!("unknown backend '{}'", backend)));
                }
            }
            (None, Some(handler)) => aggregates |= handler == LocalHandler::UserOrders,
            _ => errors.push(ValidationError::new(&field, "exactly one of 'backend' and 'handler' must be set")),
        }
    }

    for (field, name) in [
        ("services.user_backend", &config.services.user_backend),
        ("services.order_backend", &config.services.order_backend),
    ] {
        if aggregates && !backend_names.contains(name.as_str()) {
            errors.push(ValidationError::new(field, format!("unknown backend '{}'", name)));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.server_secs <= config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.server_secs",
            "must be greater than timeouts.request_secs",
        ));
    }

    let telemetry = &config.telemetry;
    if !(0.0..=1.0).contains(&telemetry.sample_ratio) {
        errors.push(ValidationError::new("telemetry.sample_ratio", "must be between 0.0 and 1.0"));
    }
    if telemetry.max_queue_size == 0 {
        errors.push(ValidationError::new("telemetry.max_queue_size", "must be greater than 0"));
    }
    if telemetry.max_export_batch_size == 0 {
        errors.push(ValidationError::new("telemetry.max_export_batch_size", "must be greater than 0"));
    }
    if telemetry.scheduled_delay_ms == 0 {
        errors.push(ValidationError::new("telemetry.scheduled_delay_ms", "must be greater than 0"));
    }
    if telemetry.export_timeout_secs == 0 {
        errors.push(ValidationError::new("telemetry.export_timeout_secs", "must be greater than 0"));
    }
    if telemetry.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new("telemetry.shutdown_timeout_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
