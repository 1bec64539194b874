//! In-memory span capture for unit tests.

use opentelemetry::Value;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

use crate::trace::export::sampler;
use crate::trace::Tracer;

/// A tracer sampling everything and exporting synchronously into memory.
pub(crate) fn recording_tracer(service: &str) -> (Tracer, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_sampler(sampler(1.0))
        .with_simple_exporter(exporter.clone())
        .build();
    (Tracer::new(service, provider), exporter)
}

pub(crate) fn spans_named(exporter: &InMemorySpanExporter, name: &str) -> Vec<SpanData> {
    exporter
        .get_finished_spans()
        .unwrap_or_default()
        .into_iter()
        .filter(|s| s.name == name)
        .collect()
}

pub(crate) fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .rev()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}
