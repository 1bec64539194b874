//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → trace middleware (server span, TraceContext in extensions)
//!     → gateway: routing → forward.rs | aggregate.rs | health.rs
//!       service: services::* handlers
//!     → error.rs (ApiError → JSON error body)
//!     → Send to client
//! ```

pub mod aggregate;
pub mod error;
pub mod forward;
pub mod health;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
