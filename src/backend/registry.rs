//! Backend registry.
//!
//! # Responsibilities
//! - Represent each logical backend by name and base URL
//! - Build the immutable name → backend map from configuration
//! - Join a backend base URL with a request path and query

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::BackendConfig;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("backend '{name}' has invalid address '{address}': {source}")]
    InvalidAddress {
        name: String,
        address: String,
        #[source]
        source: url::ParseError,
    },
}

/// A single logical backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRef {
    pub name: String,
    pub base_url: Url,
}

impl BackendRef {
    pub fn new(name: impl Into<String>, address: &str) -> Result<Self, RegistryError> {
        let name = name.into();
        let base_url = Url::parse(address).map_err(|source| RegistryError::InvalidAddress {
            name: name.clone(),
            address: address.to_string(),
            source,
        })?;
        Ok(Self { name, base_url })
    }

    /// Absolute URL for `path_and_query` under this backend's base path.
    ///
    /// `http://svc:3001/base` + `/5?x=1` → `http://svc:3001/base/5?x=1`.
    /// The path and query are appended verbatim: dot segments and escapes
    /// reach the backend unchanged.
    pub fn endpoint(&self, path_and_query: &str) -> String {
        let origin = self.base_url.origin().ascii_serialization();
        let base = self.base_url.path().trim_end_matches('/');
        let separator = if path_and_query.starts_with('/') { "" } else { "/" };
        format!("{}{}{}{}", origin, base, separator, path_and_query)
    }
}

/// Immutable map of backends, keyed by name.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<BackendRef>>,
}

impl BackendRegistry {
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, RegistryError> {
        let mut backends = HashMap::with_capacity(configs.len());
        for config in configs {
            let backend = BackendRef::new(config.name.clone(), &config.address)?;
            tracing::debug!(backend = %backend.name, base_url = %backend.base_url, "Backend registered");
            backends.insert(config.name.clone(), Arc::new(backend));
        }
        Ok(Self { backends })
    }

    pub fn get(&self, name: &str) -> Option<Arc<BackendRef>> {
        self.backends.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
