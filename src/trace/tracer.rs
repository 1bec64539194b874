//! The per-process tracer.
//!
//! A `Tracer` is built once at startup and handed to every component that
//! starts spans. It is cheap to clone. Spans are always started from an
//! explicit parent [`TraceContext`], never from an ambient current span.

use axum::http::HeaderMap;
use opentelemetry::trace::{Span as _, SpanBuilder, SpanKind, TracerProvider as _};
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::trace::context::TraceContext;
use crate::trace::span::SpanHandle;

/// Errors from tracer lifecycle operations.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("tracer already shut down")]
    AlreadyShutdown,

    #[error("span export did not drain within {0:?}")]
    FlushTimeout(Duration),

    #[error("span pipeline error: {0}")]
    Sdk(#[from] OTelSdkError),

    #[error("span pipeline task failed: {0}")]
    Join(String),
}

struct TracerInner {
    service: String,
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    shut_down: AtomicBool,
}

/// Starts spans and owns the export pipeline.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("service", &self.inner.service)
            .field("shut_down", &self.inner.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

impl Tracer {
    /// Create a tracer for `service` on top of `provider`. The
    /// instrumentation scope of every span is named after the service.
    pub fn new(service: impl Into<String>, provider: SdkTracerProvider) -> Self {
        let service = service.into();
        let tracer = provider.tracer(service.clone());
        Self {
            inner: Arc::new(TracerInner {
                service,
                provider,
                tracer,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// A tracer that creates and propagates contexts but exports nothing.
    pub fn noop(service: impl Into<String>) -> Self {
        Self::new(service, SdkTracerProvider::builder().build())
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Context for a new trace. The sampling decision is made by the
    /// provider's sampler when the first span starts from it.
    pub fn new_root(&self) -> TraceContext {
        TraceContext::root()
    }

    /// Continue the trace carried by `headers`, or start a new root.
    pub fn extract(&self, headers: &HeaderMap) -> TraceContext {
        TraceContext::extract(headers).unwrap_or_else(|| self.new_root())
    }

    /// Start an internal span as a child of `parent`.
    pub fn start_span(&self, parent: &TraceContext, name: impl Into<String>) -> (TraceContext, SpanHandle) {
        self.start_span_with_kind(parent, name, SpanKind::Internal)
    }

    pub fn start_span_with_kind(
        &self,
        parent: &TraceContext,
        name: impl Into<String>,
        kind: SpanKind,
    ) -> (TraceContext, SpanHandle) {
        let name: String = name.into();
        let span = SpanBuilder::from_name(name)
            .with_kind(kind)
            .start_with_context(&self.inner.tracer, &parent.to_otel());
        let ctx = TraceContext::from_span_context(span.span_context().clone());
        (ctx, SpanHandle::start(span))
    }

    /// Export every span ended so far, waiting at most `timeout`.
    pub async fn force_flush(&self, timeout: Duration) -> Result<(), TraceError> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(TraceError::AlreadyShutdown);
        }
        let provider = self.inner.provider.clone();
        self.run_blocking(timeout, move || provider.force_flush()).await
    }

    /// Flush pending spans and stop the export pipeline. A second call fails
    /// with `AlreadyShutdown`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), TraceError> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Err(TraceError::AlreadyShutdown);
        }
        let provider = self.inner.provider.clone();
        match self.run_blocking(timeout, move || provider.shutdown()).await {
            Ok(()) => {
                tracing::info!(service = %self.inner.service, "Span exporter flushed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(service = %self.inner.service, error = %e, "Span exporter did not drain cleanly");
                Err(e)
            }
        }
    }

    /// The SDK flush and shutdown calls block until the batch thread
    /// answers, so they run off the async workers.
    async fn run_blocking<F>(&self, timeout: Duration, op: F) -> Result<(), TraceError>
    where
        F: FnOnce() -> Result<(), OTelSdkError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(op);
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map_err(TraceError::from),
            Ok(Err(join)) => Err(TraceError::Join(join.to_string())),
            Err(_) => Err(TraceError::FlushTimeout(timeout)),
        }
    }
}
