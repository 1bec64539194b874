//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the selected role
//! - Wire up middleware (trace context, request ID, timeout, logging)
//! - Dispatch gateway requests through the route table
//! - Forward to backends or run local handlers
//! - Serve until the shutdown signal, then drain

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Extension, Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::backend::{BackendClient, BackendRegistry, RegistryError};
use crate::config::{LocalHandler, MeshConfig};
use crate::http::aggregate::UserOrdersAggregator;
use crate::http::error::ApiError;
use crate::http::forward::Forwarder;
use crate::http::health::health;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::shutdown::recv_shutdown;
use crate::lifecycle::Role;
use crate::routing::{Destination, RouteError, RouteTable};
use crate::services;
use crate::trace::middleware::trace_requests;
use crate::trace::{TraceContext, Tracer};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("unknown backend '{0}'")]
    MissingBackend(String),
}

/// Gateway state injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: &'static str,
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub aggregator: Option<UserOrdersAggregator>,
}

impl GatewayState {
    pub fn from_config(config: &MeshConfig, tracer: Tracer) -> Result<Self, ServerError> {
        let registry = BackendRegistry::from_config(&config.backends)?;
        let routes = RouteTable::from_config(&config.routes, &registry)?;

        let aggregates = routes
            .routes()
            .iter()
            .any(|r| matches!(r.destination, Destination::Local(LocalHandler::UserOrders)));
        let aggregator = if aggregates {
            let lookup = |name: &String| {
                registry
                    .get(name)
                    .ok_or_else(|| ServerError::MissingBackend(name.clone()))
            };
            let users = lookup(&config.services.user_backend)?;
            let orders = lookup(&config.services.order_backend)?;
            let client = BackendClient::new(&config.timeouts, tracer.clone())?;
            Some(UserOrdersAggregator::new(client, users, orders))
        } else {
            None
        };

        Ok(Self {
            service: Role::Gateway.service_name(),
            routes: Arc::new(routes),
            forwarder: Forwarder::new(&config.timeouts, tracer),
            aggregator,
        })
    }
}

/// HTTP server for one role.
pub struct HttpServer {
    router: Router,
    role: Role,
}

impl HttpServer {
    /// Build the server for `role` with the given configuration.
    pub fn new(role: Role, config: &MeshConfig, tracer: Tracer) -> Result<Self, ServerError> {
        let service = role.service_name();
        let app = match role {
            Role::Gateway => {
                let state = GatewayState::from_config(config, tracer.clone())?;
                Router::new()
                    .route("/{*path}", any(gateway_handler))
                    .route("/", any(gateway_handler))
                    .with_state(state)
            }
            Role::Users => services::users_app(config, tracer.clone()),
            Role::Orders => services::orders_app(config, tracer.clone())?,
            Role::Inventory => services::inventory_app(config, tracer.clone()),
        };
        let app = if role == Role::Gateway {
            app
        } else {
            app.route("/health", get(move || async move { health(service) }))
        };

        let router = Self::build_router(app, tracer, Duration::from_secs(config.timeouts.server_secs));
        Ok(Self { router, role })
    }

    /// Wrap `app` in the middleware shared by every service.
    ///
    /// Outermost first: request ID, HTTP logging, request ID echo, timeout,
    /// trace context.
    #[allow(deprecated)]
    fn build_router(app: Router, tracer: Tracer, server_timeout: Duration) -> Router {
        app.layer(middleware::from_fn_with_state(tracer, trace_requests))
            .layer(TimeoutLayer::new(server_timeout))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            service = self.role.service_name(),
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await?;

        tracing::info!(service = self.role.service_name(), "HTTP server stopped");
        Ok(())
    }

    /// The assembled router, for in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Gateway entry point: resolve the route and dispatch.
async fn gateway_handler(
    State(state): State<GatewayState>,
    Extension(ctx): Extension<TraceContext>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(route_match) = state.routes.resolve(&path) else {
        tracing::warn!(path = %path, "No route matched");
        return ApiError::NotFound("no route for path".to_string()).into_response();
    };

    tracing::debug!(route = %route_match.route.name, path = %path, "Route matched");
    match &route_match.route.destination {
        Destination::Backend(backend) => state.forwarder.forward(&ctx, request, &route_match, backend).await,
        Destination::Local(LocalHandler::Health) => health(state.service).into_response(),
        Destination::Local(LocalHandler::UserOrders) => match &state.aggregator {
            Some(aggregator) => aggregator.handle(&ctx, &path).await.into_response(),
            None => ApiError::Internal("aggregation not configured".to_string()).into_response(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn gateway() -> Router {
        HttpServer::new(Role::Gateway, &MeshConfig::default(), Tracer::noop("api-gateway"))
            .unwrap()
            .into_router()
    }

    #[tokio::test]
    async fn gateway_health_is_local() {
        let response = gateway()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"status": "healthy", "service": "api-gateway"}));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let response = gateway()
            .oneshot(Request::builder().uri("/nothing/here").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inbound_request_id_is_echoed() {
        let response = gateway()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(X_REQUEST_ID, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "req-123");
    }

    #[test]
    fn aggregator_needs_known_backends() {
        let mut config = MeshConfig::default();
        config.services.user_backend = "nobody".into();
        let err = GatewayState::from_config(&config, Tracer::noop("api-gateway")).err().unwrap();
        assert!(matches!(err, ServerError::MissingBackend(name) if name == "nobody"));
    }

    #[test]
    fn aggregator_is_optional() {
        let mut config = MeshConfig::default();
        config.routes = vec![RouteConfig::to_backend("users", "/api/users", "users")];
        config.services.user_backend = "nobody".into();
        let state = GatewayState::from_config(&config, Tracer::noop("api-gateway")).unwrap();
        assert!(state.aggregator.is_none());
    }
}
