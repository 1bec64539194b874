//! Trace identity and the W3C `traceparent` carrier.
//!
//! # Responsibilities
//! - Parse an inbound `traceparent` header into a [`TraceContext`]
//! - Write a [`TraceContext`] into outbound headers
//! - Bridge the explicit context value to an OpenTelemetry `Context`
//!
//! # Design Decisions
//! - `TraceContext` is a plain value passed by reference explicitly;
//!   there is no ambient "current span" and no global propagator
//! - Malformed carriers are ignored, never rejected: the request simply
//!   starts a new root trace

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceId};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::collections::HashMap;

/// Header used to carry trace context between services.
pub const TRACEPARENT: &str = "traceparent";

const TRACESTATE: &str = "tracestate";

/// Reads W3C headers from an inbound `HeaderMap`.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        [TRACEPARENT, TRACESTATE]
            .into_iter()
            .filter(|k| self.0.contains_key(*k))
            .collect()
    }
}

/// Writes W3C headers into an outbound `HeaderMap`.
struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(&value)) else {
            tracing::warn!(header = key, "Failed to encode trace header");
            return;
        };
        self.0.insert(name, value);
    }
}

/// `traceparent` shape check: `<version>-<trace id>-<span id>-<flags>`,
/// all lowercase hex. Version `ff` is forbidden and version `00` carries
/// exactly four fields.
fn is_well_formed(value: &str) -> bool {
    fn lower_hex(field: &str, len: usize) -> bool {
        field.len() == len && field.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    let fields: Vec<&str> = value.split('-').collect();
    let [version, trace_id, span_id, flags, rest @ ..] = fields.as_slice() else {
        return false;
    };
    lower_hex(version, 2)
        && *version != "ff"
        && (*version != "00" || rest.is_empty())
        && lower_hex(trace_id, 32)
        && lower_hex(span_id, 16)
        && lower_hex(flags, 2)
}

/// Immutable per-request trace context.
///
/// Wraps the span context that work started from this value becomes a
/// child of. A fresh root context wraps an invalid span context.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    span_context: SpanContext,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::root()
    }
}

impl TraceContext {
    /// A context with no parent: spans started from it begin a new trace.
    pub fn root() -> Self {
        Self {
            span_context: SpanContext::empty_context(),
        }
    }

    pub(crate) fn from_span_context(span_context: SpanContext) -> Self {
        Self { span_context }
    }

    pub fn trace_id(&self) -> TraceId {
        self.span_context.trace_id()
    }

    /// Span that work started from this context becomes a child of.
    pub fn span_id(&self) -> Option<SpanId> {
        self.span_context
            .is_valid()
            .then(|| self.span_context.span_id())
    }

    pub fn is_sampled(&self) -> bool {
        self.span_context.is_sampled()
    }

    pub fn is_root(&self) -> bool {
        !self.span_context.is_valid()
    }

    /// Parent context for the SDK.
    pub(crate) fn to_otel(&self) -> Context {
        if self.is_root() {
            Context::new()
        } else {
            Context::new().with_remote_span_context(self.span_context.clone())
        }
    }

    /// Parse a `traceparent` value: `00-<trace id>-<span id>-<flags>`.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        if !is_well_formed(value) {
            return None;
        }
        let carrier = HashMap::from([(TRACEPARENT.to_string(), value.to_string())]);
        let cx = TraceContextPropagator::new().extract(&carrier);
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(Self { span_context })
    }

    /// Format as a `traceparent` value. Root contexts have no span to
    /// reference and yield `None`.
    pub fn to_traceparent(&self) -> Option<String> {
        let mut carrier: HashMap<String, String> = HashMap::new();
        TraceContextPropagator::new().inject_context(&self.to_otel(), &mut carrier);
        carrier.remove(TRACEPARENT)
    }

    /// Read the context from an inbound carrier, if present and valid.
    pub fn extract(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(TRACEPARENT)?.to_str().ok()?;
        if !is_well_formed(value) {
            return None;
        }
        let cx = TraceContextPropagator::new().extract(&HeaderExtractor(headers));
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(Self { span_context })
    }

    /// Write the context into an outbound carrier, replacing any existing
    /// trace headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        headers.remove(TRACEPARENT);
        headers.remove(TRACESTATE);
        TraceContextPropagator::new().inject_context(&self.to_otel(), &mut HeaderInjector(headers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{TraceFlags, TraceState};

    const SAMPLE: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn local(trace_id: &str, span_id: &str) -> TraceContext {
        TraceContext::from_span_context(SpanContext::new(
            TraceId::from_hex(trace_id).unwrap(),
            SpanId::from_hex(span_id).unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        ))
    }

    #[test]
    fn parses_valid_traceparent() {
        let ctx = TraceContext::from_traceparent(SAMPLE).unwrap();
        assert_eq!(ctx.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.span_id().unwrap().to_string(), "00f067aa0ba902b7");
        assert!(ctx.is_sampled());
    }

    #[test]
    fn traceparent_round_trip_keeps_trace_id() {
        let ctx = TraceContext::from_traceparent(SAMPLE).unwrap();
        let formatted = ctx.to_traceparent().unwrap();
        assert_eq!(formatted, SAMPLE);

        let reparsed = TraceContext::from_traceparent(&formatted).unwrap();
        assert_eq!(reparsed.trace_id(), ctx.trace_id());
    }

    #[test]
    fn unsampled_flag_is_preserved() {
        let ctx = TraceContext::from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00").unwrap();
        assert!(!ctx.is_sampled());
        assert!(ctx.to_traceparent().unwrap().ends_with("-00"));
    }

    #[test]
    fn rejects_malformed_traceparent() {
        let bad = [
            "",
            "garbage",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "00-4bf92f3577b34da6a3ce929d0e0e47zz-00f067aa0ba902b7-01",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
        ];
        for value in bad {
            assert!(TraceContext::from_traceparent(value).is_none(), "accepted {value:?}");
        }
    }

    #[test]
    fn rejects_non_lowercase_hex_fields() {
        let bad = [
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00F067AA0BA902B7-01",
            "00-+bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-+0f067aa0ba902b7-01",
            "zz-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-+1",
        ];
        for value in bad {
            assert!(TraceContext::from_traceparent(value).is_none(), "accepted {value:?}");
            let mut headers = HeaderMap::new();
            headers.insert(TRACEPARENT, HeaderValue::from_str(value).unwrap());
            assert!(TraceContext::extract(&headers).is_none(), "extracted {value:?}");
        }
    }

    #[test]
    fn root_has_no_traceparent() {
        let root = TraceContext::root();
        assert!(root.is_root());
        assert!(root.span_id().is_none());
        assert!(root.to_traceparent().is_none());

        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT, HeaderValue::from_static(SAMPLE));
        root.inject(&mut headers);
        assert!(headers.get(TRACEPARENT).is_none());
    }

    #[test]
    fn inject_then_extract() {
        let ctx = local("4bf92f3577b34da6a3ce929d0e0e4736", "0000000000000abc");
        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT, HeaderValue::from_static(SAMPLE));

        ctx.inject(&mut headers);
        assert_eq!(
            headers[TRACEPARENT],
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000abc-01"
        );

        let extracted = TraceContext::extract(&headers).unwrap();
        assert_eq!(extracted.trace_id(), ctx.trace_id());
        assert_eq!(extracted.span_id(), ctx.span_id());
    }
}
