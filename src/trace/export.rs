//! Span export pipeline construction.
//!
//! # Data Flow
//! ```text
//! SpanHandle::end()
//!     → BatchSpanProcessor queue (bounded, drops when full)
//!     → batch thread (size / interval triggered)
//!     → OTLP/HTTP exporter (JSON encoding) → collector
//!
//! Tracer::shutdown()
//!     → provider shutdown: drain queue, export remainder, stop thread
//! ```
//!
//! # Design Decisions
//! - Export failures are logged by the SDK, never surfaced to callers
//! - New roots are ratio sampled; children follow their parent's decision

use opentelemetry::KeyValue;
use opentelemetry_otlp::{ExporterBuildError, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{BatchConfig, BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::TelemetryConfig;

/// OTLP/HTTP path for trace export.
pub const OTLP_TRACES_PATH: &str = "/v1/traces";

/// Errors building the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid collector endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("failed to build OTLP exporter: {0}")]
    Build(#[from] ExporterBuildError),
}

/// Resolve a configured collector address into the OTLP traces URL.
///
/// Scheme-less endpoints (`host:port`) use `http` when `insecure`, `https`
/// otherwise. An endpoint without a path gets `/v1/traces`.
pub fn resolve_endpoint(endpoint: &str, insecure: bool) -> Result<Url, url::ParseError> {
    let endpoint = endpoint.trim();
    let mut url = if endpoint.contains("://") {
        Url::parse(endpoint)?
    } else {
        let scheme = if insecure { "http" } else { "https" };
        Url::parse(&format!("{}://{}", scheme, endpoint))?
    };
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(OTLP_TRACES_PATH);
    }
    Ok(url)
}

/// Resource attributes attached to every exported span.
pub fn resource(service: &str) -> Resource {
    Resource::builder()
        .with_service_name(service.to_string())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Ratio sampling for new roots; spans with a parent inherit its decision.
pub fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio.clamp(0.0, 1.0))))
}

pub fn batch_config(config: &TelemetryConfig) -> BatchConfig {
    BatchConfigBuilder::default()
        .with_max_queue_size(config.max_queue_size)
        .with_max_export_batch_size(config.max_export_batch_size)
        .with_scheduled_delay(Duration::from_millis(config.scheduled_delay_ms))
        .build()
}

/// Build a provider exporting to the configured collector over OTLP/HTTP.
pub fn otlp_provider(service: &str, config: &TelemetryConfig) -> Result<SdkTracerProvider, ExportError> {
    let endpoint = resolve_endpoint(&config.endpoint, config.insecure)?;
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpJson)
        .with_endpoint(endpoint.as_str())
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .build()?;
    tracing::info!(
        service = service,
        endpoint = %endpoint,
        sample_ratio = config.sample_ratio,
        "Span export enabled"
    );

    let processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config(config))
        .build();
    Ok(SdkTracerProvider::builder()
        .with_resource(resource(service))
        .with_sampler(sampler(config.sample_ratio))
        .with_span_processor(processor)
        .build())
}
