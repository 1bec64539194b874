//! Traced service mesh: an API gateway and three backend services sharing
//! one distributed trace per request.

pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod services;
pub mod trace;

pub use config::schema::MeshConfig;
pub use http::HttpServer;
pub use lifecycle::{Role, Shutdown};
pub use trace::Tracer;
