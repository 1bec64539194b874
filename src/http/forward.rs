//! Reverse forwarding to backends.
//!
//! # Responsibilities
//! - Strip the matched route prefix and rewrite the target onto the
//!   backend base URL (query preserved)
//! - Relay method, headers (except `host`) and the streamed body
//! - Relay the backend response verbatim
//! - Open a client span per forwarded request
//!
//! # Design Decisions
//! - `traceparent` is replaced with the forward span's context so the
//!   backend continues the same trace
//! - The span ends when response headers arrive; the body streams after
//! - Unreachable or slow backends produce a 502, never a gateway failure

use axum::{
    body::Body,
    http::{header, Request, Uri, Version},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::backend::BackendRef;
use crate::config::TimeoutConfig;
use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::routing::RouteMatch;
use crate::trace::{SpanKind, Status, TraceContext, Tracer};

/// Relays requests to backends over a pooled hyper client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    tracer: Tracer,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, tracer: Tracer) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            tracer,
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }

    /// Forward `request` to `backend`, with the span parented on `ctx`.
    pub async fn forward(
        &self,
        ctx: &TraceContext,
        request: Request<Body>,
        route_match: &RouteMatch<'_>,
        backend: &BackendRef,
    ) -> Response {
        let (mut parts, body) = request.into_parts();
        let target = match parts.uri.query() {
            Some(query) => format!("{}?{}", route_match.remainder, query),
            None => route_match.remainder.to_string(),
        };
        let url = backend.endpoint(&target);

        let (child, mut span) =
            self.tracer
                .start_span_with_kind(ctx, route_match.route.prefix(), SpanKind::Client);
        span.set_attribute("http.method", parts.method.to_string());
        span.set_attribute("http.url", url.clone());
        span.set_attribute("peer.service", backend.name.clone());

        let uri = match url.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => {
                span.fail(&e);
                span.end();
                return ApiError::Internal(format!("invalid upstream uri: {}", e)).into_response();
            }
        };

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        parts.headers.remove(header::HOST);
        child.inject(&mut parts.headers);

        tracing::debug!(
            route = %route_match.route.name,
            backend = %backend.name,
            method = %parts.method,
            url = %url,
            "Forwarding request"
        );

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout(self.request_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                span.set_attribute("http.status_code", i64::from(status.as_u16()));
                if status.is_server_error() {
                    span.set_status(Status::error(format!("http {}", status.as_u16())));
                } else {
                    span.set_status(Status::Ok);
                }
                span.end();
                metrics::record_upstream(&backend.name, status.as_str());

                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Ok(Err(e)) => {
                tracing::error!(backend = %backend.name, url = %url, error = %e, "Upstream error");
                span.fail(&e);
                span.end();
                metrics::record_upstream(&backend.name, "connection_refused");
                ApiError::UpstreamUnavailable(format!("backend '{}' unreachable", backend.name)).into_response()
            }
            Err(_) => {
                tracing::error!(backend = %backend.name, url = %url, timeout = ?self.request_timeout, "Upstream timed out");
                span.fail(&format!("timed out after {:?}", self.request_timeout));
                span.end();
                metrics::record_upstream(&backend.name, "timeout");
                ApiError::UpstreamUnavailable(format!("backend '{}' timed out", backend.name)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalHandler;
    use crate::routing::{Destination, Route};
    use crate::trace::testing::{recording_tracer, spans_named};
    use crate::trace::TRACEPARENT;
    use axum::http::{HeaderMap, Method, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(app: Router, name: &str) -> BackendRef {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        BackendRef::new(name, &format!("http://{}", addr)).unwrap()
    }

    async fn spawn_echo() -> BackendRef {
        let app = Router::new().fallback(|method: Method, uri: Uri, headers: HeaderMap, body: String| async move {
            let headers: serde_json::Map<String, Value> = headers
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
                .collect();
            axum::Json(json!({
                "method": method.as_str(),
                "uri": uri.to_string(),
                "headers": headers,
                "body": body,
            }))
        });
        serve(app, "echo").await
    }

    fn route() -> Route {
        Route::new("users", "/api/users", Destination::Local(LocalHandler::Health))
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn strips_prefix_and_preserves_request() {
        let (tracer, exporter) = recording_tracer("gateway");
        let forwarder = Forwarder::new(&TimeoutConfig::default(), tracer.clone());
        let backend = spawn_echo().await;
        let route = route();
        let route_match = RouteMatch {
            route: &route,
            remainder: route.matcher.strip("/api/users/5").unwrap(),
        };

        let request = Request::builder()
            .method(Method::PUT)
            .uri("/api/users/5?verbose=1")
            .header("host", "gateway.local")
            .header("x-custom", "kept")
            .header(TRACEPARENT, "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .body(Body::from("payload"))
            .unwrap();

        let response = forwarder.forward(&tracer.new_root(), request, &route_match, &backend).await;
        assert_eq!(response.status(), StatusCode::OK);
        let echo = json_body(response).await;

        assert_eq!(echo["method"], "PUT");
        assert_eq!(echo["uri"], "/5?verbose=1");
        assert_eq!(echo["body"], "payload");
        assert_eq!(echo["headers"]["x-custom"], "kept");
        assert_ne!(echo["headers"]["host"], "gateway.local");

        let span = &spans_named(&exporter, "/api/users")[0];
        let forwarded = TraceContext::from_traceparent(echo["headers"][TRACEPARENT].as_str().unwrap()).unwrap();
        assert_eq!(forwarded.trace_id(), span.span_context.trace_id());
        assert_eq!(forwarded.span_id(), Some(span.span_context.span_id()));
        assert_eq!(span.span_kind, SpanKind::Client);
        assert_eq!(span.status, Status::Ok);
    }

    #[tokio::test]
    async fn dot_segments_reach_the_backend_verbatim() {
        let (tracer, _exporter) = recording_tracer("gateway");
        let forwarder = Forwarder::new(&TimeoutConfig::default(), tracer.clone());
        let backend = spawn_echo().await;
        let route = route();
        let route_match = RouteMatch {
            route: &route,
            remainder: route.matcher.strip("/api/users/../orders/1").unwrap(),
        };

        let request = Request::builder()
            .uri("/api/users/../orders/1")
            .body(Body::empty())
            .unwrap();
        let response = forwarder.forward(&tracer.new_root(), request, &route_match, &backend).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["uri"], "/../orders/1");
    }

    #[tokio::test]
    async fn slow_backend_times_out_with_502() {
        let (tracer, exporter) = recording_tracer("gateway");
        let timeouts = TimeoutConfig {
            request_secs: 1,
            ..TimeoutConfig::default()
        };
        let forwarder = Forwarder::new(&timeouts, tracer.clone());
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "late"
        });
        let backend = serve(app, "slow").await;
        let route = route();
        let route_match = RouteMatch {
            route: &route,
            remainder: "/1",
        };

        let request = Request::builder().uri("/api/users/1").body(Body::empty()).unwrap();
        let response = forwarder.forward(&tracer.new_root(), request, &route_match, &backend).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "backend 'slow' timed out");

        let span = &spans_named(&exporter, "/api/users")[0];
        assert!(
            matches!(&span.status, Status::Error { description } if description.contains("timed out")),
            "unexpected status {:?}",
            span.status
        );
    }

    #[tokio::test]
    async fn unreachable_backend_returns_502() {
        let (tracer, exporter) = recording_tracer("gateway");
        let forwarder = Forwarder::new(&TimeoutConfig::default(), tracer.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = BackendRef::new("gone", &format!("http://{}", addr)).unwrap();
        let route = route();
        let route_match = RouteMatch {
            route: &route,
            remainder: "/",
        };

        let request = Request::builder().uri("/api/users").body(Body::empty()).unwrap();
        let response = forwarder
            .forward(&tracer.new_root(), request, &route_match, &backend)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(matches!(
            spans_named(&exporter, "/api/users")[0].status,
            Status::Error { .. }
        ));
    }
}
