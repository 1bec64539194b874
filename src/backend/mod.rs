//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! BackendConfig[] → registry.rs (name → BackendRef, immutable)
//!
//! handler (ctx) → client.rs → client span → traceparent injected
//!     → reqwest → backend
//!     → BackendResponse | ClientError
//! ```

pub mod client;
pub mod registry;

pub use client::{BackendClient, BackendResponse, ClientError, ClientErrorKind};
pub use registry::{BackendRef, BackendRegistry, RegistryError};
