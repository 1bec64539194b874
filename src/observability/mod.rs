//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms)
//!     → crate::trace (distributed spans, exported to a collector)
//! ```
//!
//! # Design Decisions
//! - Logs and distributed spans are separate: log events go to stdout,
//!   spans go to the collector
//! - Metrics are cheap and optional

pub mod logging;
pub mod metrics;
