//! Spans: timed, named units of work.
//!
//! A [`SpanHandle`] is the only way to mutate a span. It is ended exactly
//! once: `end()` consumes the handle, and a handle dropped without `end()`
//! (early return, cancelled future, panic unwind) ends itself in `Drop`.

use opentelemetry::trace::{Span as _, SpanId, Status};
use opentelemetry::{Key, KeyValue, Value};
use opentelemetry_sdk::trace::Span;
use std::fmt;

/// Status message used for spans dropped before they were ended.
pub const CANCELLED: &str = "cancelled";

/// Event name used by [`SpanHandle::record_error`].
pub const EXCEPTION_EVENT: &str = "exception";

/// Handle to an in-flight span.
#[derive(Debug)]
pub struct SpanHandle {
    span: Option<Span>,
    status_set: bool,
}

impl SpanHandle {
    pub(crate) fn start(span: Span) -> Self {
        Self {
            span: Some(span),
            status_set: false,
        }
    }

    pub fn span_id(&self) -> Option<SpanId> {
        self.span.as_ref().map(|s| s.span_context().span_id())
    }

    /// Set an attribute. Setting an existing key replaces its value.
    pub fn set_attribute(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        if let Some(span) = self.span.as_mut() {
            span.set_attribute(KeyValue::new(key, value));
        }
    }

    /// Record an error event without changing the status.
    pub fn record_error(&mut self, err: &dyn fmt::Display) {
        if let Some(span) = self.span.as_mut() {
            span.add_event(
                EXCEPTION_EVENT,
                vec![KeyValue::new("exception.message", err.to_string())],
            );
        }
    }

    pub fn set_status(&mut self, status: Status) {
        if let Some(span) = self.span.as_mut() {
            self.status_set = true;
            span.set_status(status);
        }
    }

    /// Record `err` and mark the span failed with its message.
    pub fn fail(&mut self, err: &dyn fmt::Display) {
        self.record_error(err);
        self.set_status(Status::error(err.to_string()));
    }

    /// End the span and hand it to the export pipeline.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        if self.span.is_some() && !self.status_set {
            self.set_status(Status::error(CANCELLED));
        }
        self.finish();
    }
}
