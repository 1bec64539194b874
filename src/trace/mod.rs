//! Trace context propagation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (extract traceparent, open server span)
//!     → handlers call Tracer::start_span(&ctx, name) explicitly
//!     → context.rs (child context injected into outbound calls)
//!     → span.rs (SpanHandle::end hands the span to the SDK processor)
//!     → export.rs (batch processor → OTLP/HTTP collector)
//! ```
//!
//! # Design Decisions
//! - No global tracer or propagator: the `Tracer` is passed to components
//!   at construction
//! - No ambient current span: the parent `TraceContext` is an explicit
//!   argument of every span-starting call
//! - Spans are ended exactly once, including on drop
//! - Export is asynchronous with a single bounded flush at shutdown

pub mod context;
pub mod export;
pub mod middleware;
pub mod span;
pub mod tracer;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{TraceContext, TRACEPARENT};
pub use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
pub use opentelemetry::Value;
pub use span::SpanHandle;
pub use tracer::{TraceError, Tracer};
