//! Outbound calls to named backends.
//!
//! # Responsibilities
//! - Wrap every call in a client span named after the operation
//! - Inject the child span's `traceparent` into the outbound request
//! - Classify failures (timeout, connection, status, decode)
//!
//! # Design Decisions
//! - Never retries: failures propagate to the caller immediately
//! - Non-2xx responses are errors; callers map them to their own semantics
//! - Connect and total timeouts come from `TimeoutConfig`

use axum::body::Bytes;
use axum::http::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::backend::BackendRef;
use crate::config::TimeoutConfig;
use crate::observability::metrics;
use crate::trace::{SpanKind, Status, TraceContext, Tracer};

/// Why a backend call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientErrorKind {
    Timeout,
    /// Connection refused, reset, DNS failure and other transport errors.
    ConnectionRefused,
    BadStatus(u16),
    Decode(String),
}

impl ClientErrorKind {
    /// Short label used for metrics.
    pub fn label(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::ConnectionRefused => "connection_refused".to_string(),
            Self::BadStatus(code) => code.to_string(),
            Self::Decode(_) => "decode".to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("backend '{backend}' {}", describe(.kind))]
pub struct ClientError {
    pub backend: String,
    pub kind: ClientErrorKind,
}

fn describe(kind: &ClientErrorKind) -> String {
    match kind {
        ClientErrorKind::Timeout => "timed out".to_string(),
        ClientErrorKind::ConnectionRefused => "unreachable".to_string(),
        ClientErrorKind::BadStatus(code) => format!("returned status {}", code),
        ClientErrorKind::Decode(msg) => format!("returned an undecodable body: {}", msg),
    }
}

impl ClientError {
    fn new(backend: &BackendRef, kind: ClientErrorKind) -> Self {
        Self {
            backend: backend.name.clone(),
            kind,
        }
    }

    fn from_reqwest(backend: &BackendRef, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ClientErrorKind::Timeout
        } else if let Some(status) = err.status() {
            ClientErrorKind::BadStatus(status.as_u16())
        } else if err.is_decode() {
            ClientErrorKind::Decode(err.to_string())
        } else {
            ClientErrorKind::ConnectionRefused
        };
        Self::new(backend, kind)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ClientErrorKind::BadStatus(404)
    }
}

/// A successful (2xx) backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Traced HTTP client for backend-to-backend calls.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    tracer: Tracer,
}

impl BackendClient {
    pub fn new(timeouts: &TimeoutConfig, tracer: Tracer) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .build()?;
        Ok(Self { http, tracer })
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Call `backend` at `path` (path and query) under a client span named
    /// `operation`, child of `ctx`.
    pub async fn call(
        &self,
        ctx: &TraceContext,
        operation: &str,
        method: Method,
        backend: &BackendRef,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<BackendResponse, ClientError> {
        let (child, mut span) = self.tracer.start_span_with_kind(ctx, operation, SpanKind::Client);
        let url = backend.endpoint(path);
        span.set_attribute("http.method", method.to_string());
        span.set_attribute("http.url", url.clone());
        span.set_attribute("peer.service", backend.name.clone());

        let mut headers = HeaderMap::new();
        child.inject(&mut headers);
        let mut request = self.http.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = async {
            let response = request
                .send()
                .await
                .map_err(|e| ClientError::from_reqwest(backend, &e))?;
            let status = response.status();
            span.set_attribute("http.status_code", i64::from(status.as_u16()));
            if !status.is_success() {
                return Err(ClientError::new(backend, ClientErrorKind::BadStatus(status.as_u16())));
            }
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::from_reqwest(backend, &e))?;
            Ok(BackendResponse {
                status: status.as_u16(),
                headers,
                body,
            })
        }
        .await;

        match &result {
            Ok(response) => {
                metrics::record_upstream(&backend.name, &response.status.to_string());
                span.set_status(Status::Ok);
            }
            Err(e) => {
                tracing::warn!(backend = %backend.name, operation = operation, url = %url, error = %e, "Backend call failed");
                metrics::record_upstream(&backend.name, &e.kind.label());
                span.fail(e);
            }
        }
        span.end();
        result
    }

    /// [`call`](Self::call), then decode the body as JSON. The call span has
    /// already ended when decoding fails.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        ctx: &TraceContext,
        operation: &str,
        method: Method,
        backend: &BackendRef,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClientError> {
        let response = self.call(ctx, operation, method, backend, path, body).await?;
        response.json().map_err(|e| {
            tracing::warn!(backend = %backend.name, operation = operation, error = %e, "Backend response did not decode");
            ClientError::new(backend, ClientErrorKind::Decode(e.to_string()))
        })
    }
}
