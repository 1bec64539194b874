//! Fan-out aggregation of a user and their orders.
//!
//! `GET /api/user/{id}/orders` → `{"user": {...}, "orders": [...]}`.
//!
//! Both backend calls run concurrently under one umbrella span. The result
//! is all-or-nothing: if either call fails the whole request fails.

use axum::Json;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;

use crate::backend::{BackendClient, BackendRef};
use crate::http::error::ApiError;
use crate::services::orders::Order;
use crate::services::users::User;
use crate::trace::{SpanHandle, Status, TraceContext};

/// Name of the umbrella span.
pub const AGGREGATE_SPAN: &str = "get_user_orders_aggregate";

#[derive(Debug, Serialize)]
pub struct UserOrders {
    pub user: User,
    pub orders: Vec<Order>,
}

#[derive(Clone)]
pub struct UserOrdersAggregator {
    client: BackendClient,
    users: Arc<BackendRef>,
    orders: Arc<BackendRef>,
}

impl UserOrdersAggregator {
    pub fn new(client: BackendClient, users: Arc<BackendRef>, orders: Arc<BackendRef>) -> Self {
        Self { client, users, orders }
    }

    /// Handle the full request path, e.g. `/api/user/1/orders`.
    pub async fn handle(&self, ctx: &TraceContext, path: &str) -> Result<Json<UserOrders>, ApiError> {
        let (child, mut span) = self.client.tracer().start_span(ctx, AGGREGATE_SPAN);
        span.set_attribute("operation.type", "aggregate");

        let result = self.aggregate(&child, path, &mut span).await;
        match &result {
            Ok(body) => {
                span.set_attribute("order.count", body.orders.len() as i64);
                span.set_status(Status::Ok);
            }
            Err(e) => span.fail(e),
        }
        span.end();
        result.map(Json)
    }

    async fn aggregate(
        &self,
        ctx: &TraceContext,
        path: &str,
        span: &mut SpanHandle,
    ) -> Result<UserOrders, ApiError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.len() < 4 {
            return Err(ApiError::NotFound("not found".to_string()));
        }
        let user_id: i64 = segments[2]
            .parse()
            .map_err(|_| ApiError::Validation("invalid user id".to_string()))?;
        span.set_attribute("user.id", user_id);

        let user_path = format!("/users/{}", user_id);
        let orders_path = format!("/orders?user_id={}", user_id);
        let (user, orders) = tokio::join!(
            self.client
                .call_json::<User>(ctx, "get_user", Method::GET, &self.users, &user_path, None),
            self.client
                .call_json::<Vec<Order>>(ctx, "get_user_orders", Method::GET, &self.orders, &orders_path, None),
        );

        let user = user.map_err(|e| {
            if e.is_not_found() {
                ApiError::NotFound("user not found".to_string())
            } else {
                ApiError::from(e)
            }
        })?;
        let orders = orders.map_err(|e| match ApiError::from(e) {
            ApiError::NotFound(msg) => ApiError::UpstreamUnavailable(msg),
            other => other,
        })?;

        tracing::debug!(user_id = user_id, orders = orders.len(), "Aggregated user orders");
        Ok(UserOrders { user, orders })
    }
}
