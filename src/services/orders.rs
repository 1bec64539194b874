//! Order service.
//!
//! Orders are listed, fetched and created here. Creating an order verifies
//! the user against the user service first, continuing the caller's trace.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::{BackendClient, BackendRef};
use crate::http::error::ApiError;
use crate::services::store::{Record, Store};
use crate::services::SimulatedLatency;
use crate::trace::{Status, TraceContext};

/// Price used for items submitted without one.
pub const DEFAULT_ITEM_PRICE: f64 = 25.99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl OrderItem {
    fn line_total(&self) -> f64 {
        let price = match self.price {
            Some(price) if price != 0.0 => price,
            _ => DEFAULT_ITEM_PRICE,
        };
        price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: String,
}

impl Record for Order {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrders {
    pub user_id: Option<i64>,
}

pub fn seed() -> Vec<Order> {
    vec![
        Order {
            id: 1,
            user_id: 1,
            items: vec![OrderItem {
                product_id: 101,
                quantity: 2,
                price: None,
            }],
            total: 99.98,
            status: "completed".to_string(),
        },
        Order {
            id: 2,
            user_id: 2,
            items: vec![OrderItem {
                product_id: 102,
                quantity: 1,
                price: None,
            }],
            total: 49.99,
            status: "pending".to_string(),
        },
    ]
}

#[derive(Clone)]
pub struct OrdersState {
    pub store: Arc<Store<Order>>,
    pub client: BackendClient,
    pub users: Arc<BackendRef>,
    pub latency: SimulatedLatency,
}

pub fn router(state: OrdersState) -> Router {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order))
        .with_state(state)
}

async fn list_orders(
    State(state): State<OrdersState>,
    Extension(ctx): Extension<TraceContext>,
    query: Result<Query<ListOrders>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::Validation("invalid user id".to_string()))?;

    let (_, mut span) = state.client.tracer().start_span(&ctx, "get_all_orders");
    span.set_attribute("operation.type", "read");
    state.latency.pause().await;

    let orders = match query.user_id {
        Some(user_id) => {
            span.set_attribute("user.id", user_id);
            state.store.filter(|o| o.user_id == user_id).await
        }
        None => state.store.list().await,
    };
    span.set_attribute("order.count", orders.len() as i64);
    span.set_status(Status::Ok);
    span.end();
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<OrdersState>,
    Extension(ctx): Extension<TraceContext>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::Validation("invalid order id".to_string()))?;

    let (_, mut span) = state.client.tracer().start_span(&ctx, "get_order_by_id");
    span.set_attribute("order.id", id);
    span.set_attribute("operation.type", "read");
    state.latency.pause_brief().await;

    match state.store.get(id).await {
        Some(order) => {
            span.set_status(Status::Ok);
            span.end();
            Ok(Json(order))
        }
        None => {
            let err = ApiError::NotFound("order not found".to_string());
            span.fail(&err);
            span.end();
            Err(err)
        }
    }
}

async fn create_order(
    State(state): State<OrdersState>,
    Extension(ctx): Extension<TraceContext>,
    payload: Result<Json<CreateOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let (child, mut span) = state.client.tracer().start_span(&ctx, "create_order");
    span.set_attribute("operation.type", "write");

    let result = async {
        let Json(payload) = payload.map_err(|e| {
            tracing::debug!(error = %e, "Rejected order payload");
            ApiError::Validation("invalid request body".to_string())
        })?;
        span.set_attribute("order.user_id", payload.user_id);
        span.set_attribute("order.items_count", payload.items.len() as i64);

        verify_user(&state, &child, payload.user_id).await?;

        let total: f64 = payload.items.iter().map(OrderItem::line_total).sum();
        let order = state
            .store
            .insert_with(|id| Order {
                id,
                user_id: payload.user_id,
                items: payload.items,
                total,
                status: "pending".to_string(),
            })
            .await;
        tracing::info!(order_id = order.id, user_id = order.user_id, total = order.total, "Order created");
        Ok::<_, ApiError>(order)
    }
    .await;

    match result {
        Ok(order) => {
            span.set_attribute("order.id", order.id);
            span.set_attribute("order.total", order.total);
            span.set_status(Status::Ok);
            span.end();
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(err) => {
            span.fail(&err);
            span.end();
            Err(err)
        }
    }
}

/// Confirm the user exists. The `verify_user` span is the outbound call.
async fn verify_user(state: &OrdersState, ctx: &TraceContext, user_id: i64) -> Result<(), ApiError> {
    let path = format!("/users/{}", user_id);
    match state
        .client
        .call(ctx, "verify_user", Method::GET, &state.users, &path, None)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Err(ApiError::Validation("invalid user".to_string())),
        Err(e) => Err(ApiError::UpstreamUnavailable(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, price: Option<f64>) -> OrderItem {
        OrderItem {
            product_id: 101,
            quantity,
            price,
        }
    }

    #[test]
    fn missing_or_zero_price_uses_default() {
        assert_eq!(item(2, None).line_total(), 51.98);
        assert_eq!(item(2, Some(0.0)).line_total(), 51.98);
        assert_eq!(item(3, Some(10.0)).line_total(), 30.0);
    }

    #[test]
    fn price_is_omitted_when_absent() {
        let json = serde_json::to_value(item(1, None)).unwrap();
        assert_eq!(json, serde_json::json!({"product_id": 101, "quantity": 1}));
    }
}
