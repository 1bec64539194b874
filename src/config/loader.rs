//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::MeshConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {key}={value}")]
    Env { key: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: file (or defaults), then environment overrides, then
/// validation.
pub fn load_config(path: Option<&Path>) -> Result<MeshConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => MeshConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<MeshConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides:
/// - `PORT`: listener port
/// - `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT`, then `OTEL_EXPORTER_OTLP_ENDPOINT`:
///   collector endpoint
/// - `<NAME>_SERVICE_URL`: address of backend `<name>`
pub fn apply_env_overrides<F>(config: &mut MeshConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let parsed = port.trim().parse::<u16>().map_err(|_| ConfigError::Env {
            key: "PORT".to_string(),
            value: port.clone(),
        })?;
        config.listener.port = Some(parsed);
    }

    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT")
        .or_else(|| lookup("OTEL_EXPORTER_OTLP_ENDPOINT"))
        .filter(|e| !e.trim().is_empty())
    {
        config.telemetry.endpoint = endpoint;
    }

    for backend in &mut config.backends {
        if let Some(address) = lookup(&backend_env_key(&backend.name)) {
            tracing::debug!(backend = %backend.name, address = %address, "Backend address overridden from environment");
            backend.address = address;
        }
    }
    Ok(())
}

/// Environment variable overriding the address of backend `name`.
pub fn backend_env_key(name: &str) -> String {
    format!("{}_SERVICE_URL", name.to_uppercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LocalHandler;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config = parse_config(
            r#"
            [listener]
            port = 4000

            [[routes]]
            name = "users"
            path_prefix = "/users"
            backend = "users"

            [[routes]]
            name = "agg"
            path_prefix = "/api/user"
            handler = "user-orders"

            [[backends]]
            name = "users"
            address = "http://127.0.0.1:3001"

            [telemetry]
            sample_ratio = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, Some(4000));
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].handler, Some(LocalHandler::UserOrders));
        assert_eq!(config.telemetry.sample_ratio, 0.5);
        assert_eq!(config.telemetry.max_export_batch_size, 512);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MeshConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "8088"),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://base:4318"),
                ("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", "collector:4318"),
                ("USERS_SERVICE_URL", "http://localhost:9001"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.port, Some(8088));
        assert_eq!(config.telemetry.endpoint, "collector:4318");
        assert_eq!(config.backend("users").unwrap().address, "http://localhost:9001");
        assert_eq!(config.backend("orders").unwrap().address, "http://order-service:3002");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut config = MeshConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn backend_env_key_format() {
        assert_eq!(backend_env_key("users"), "USERS_SERVICE_URL");
        assert_eq!(backend_env_key("user-service"), "USER_SERVICE_SERVICE_URL");
    }
}
