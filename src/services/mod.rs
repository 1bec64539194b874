//! Backend services.
//!
//! # Data Flow
//! ```text
//! request (server span + TraceContext in extensions)
//!     → users.rs | orders.rs | inventory.rs handler
//!     → handler span (operation name, operation.type)
//!     → store.rs (RwLock-guarded records)
//!     → orders only: BackendClient → user service (verify_user)
//! ```
//!
//! # Design Decisions
//! - Stores are owned by each service's state; nothing is global
//! - Paths are served both canonically (`/users/1`) and as the gateway
//!   delivers them after prefix stripping (`/1`)
//! - A random delay stands in for database latency

pub mod inventory;
pub mod orders;
pub mod store;
pub mod users;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendClient, BackendRegistry};
use crate::config::MeshConfig;
use crate::http::server::ServerError;
use crate::trace::Tracer;

pub use store::{Record, Store};

/// Random processing delay of up to `max_ms` milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedLatency {
    max_ms: u64,
}

impl SimulatedLatency {
    pub fn new(max_ms: u64) -> Self {
        Self { max_ms }
    }

    /// Delay used by collection reads.
    pub async fn pause(&self) {
        sleep_up_to(self.max_ms).await;
    }

    /// Delay used by single-record lookups.
    pub async fn pause_brief(&self) {
        sleep_up_to(self.max_ms / 2).await;
    }
}

async fn sleep_up_to(bound_ms: u64) {
    if bound_ms == 0 {
        return;
    }
    tokio::time::sleep(Duration::from_millis(fastrand::u64(0..bound_ms))).await;
}

pub fn users_app(config: &MeshConfig, tracer: Tracer) -> Router {
    users::router(users::UsersState {
        store: Arc::new(Store::new(users::seed())),
        tracer,
        latency: SimulatedLatency::new(config.services.simulated_latency_ms),
    })
}

pub fn orders_app(config: &MeshConfig, tracer: Tracer) -> Result<Router, ServerError> {
    let registry = BackendRegistry::from_config(&config.backends)?;
    let users = registry
        .get(&config.services.user_backend)
        .ok_or_else(|| ServerError::MissingBackend(config.services.user_backend.clone()))?;
    Ok(orders::router(orders::OrdersState {
        store: Arc::new(Store::new(orders::seed())),
        client: BackendClient::new(&config.timeouts, tracer)?,
        users,
        latency: SimulatedLatency::new(config.services.simulated_latency_ms),
    }))
}

pub fn inventory_app(config: &MeshConfig, tracer: Tracer) -> Router {
    inventory::router(inventory::InventoryState {
        store: Arc::new(Store::new(inventory::seed())),
        tracer,
        latency: SimulatedLatency::new(config.services.simulated_latency_ms),
    })
}
