//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan over routes sorted by descending prefix length,
//!   so the first hit is the longest match
//! - Explicit no-match rather than silent default

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::backend::{BackendRef, BackendRegistry};
use crate::config::{LocalHandler, RouteConfig};
use crate::routing::matcher::PathPrefixMatcher;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate route prefix '{0}'")]
    DuplicatePrefix(String),

    #[error("route '{route}' references unknown backend '{backend}'")]
    UnknownBackend { route: String, backend: String },

    #[error("route '{0}' must name exactly one of backend or handler")]
    AmbiguousDestination(String),
}

/// Where a matched request goes.
#[derive(Debug, Clone)]
pub enum Destination {
    Backend(Arc<BackendRef>),
    Local(LocalHandler),
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub destination: Destination,
}

impl Route {
    pub fn new(name: impl Into<String>, prefix: &str, destination: Destination) -> Self {
        Self {
            name: name.into(),
            matcher: PathPrefixMatcher::new(prefix),
            destination,
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Path with the prefix removed once; `/` when nothing is left.
    pub remainder: &'a str,
}

/// The static route table.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table, rejecting duplicate normalized prefixes.
    pub fn new(mut routes: Vec<Route>) -> Result<Self, RouteError> {
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.prefix().to_string()) {
                return Err(RouteError::DuplicatePrefix(route.prefix().to_string()));
            }
        }
        // Stable sort keeps declaration order among equal lengths.
        routes.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        Ok(Self { routes })
    }

    /// Compile route configs against the backend registry.
    pub fn from_config(configs: &[RouteConfig], backends: &BackendRegistry) -> Result<Self, RouteError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            let destination = match (&config.backend, config.handler) {
                (Some(name), None) => {
                    let backend = backends.get(name).ok_or_else(|| RouteError::UnknownBackend {
                        route: config.name.clone(),
                        backend: name.clone(),
                    })?;
                    Destination::Backend(backend)
                }
                (None, Some(handler)) => Destination::Local(handler),
                _ => return Err(RouteError::AmbiguousDestination(config.name.clone())),
            };
            routes.push(Route::new(config.name.clone(), &config.path_prefix, destination));
        }
        Self::new(routes)
    }

    /// Find the longest-prefix route for `path`.
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        self.routes.iter().find_map(|route| {
            route
                .matcher
                .strip(path)
                .map(|remainder| RouteMatch { route, remainder })
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
