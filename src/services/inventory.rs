//! Inventory service.

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::error::ApiError;
use crate::services::store::{Record, Store};
use crate::services::SimulatedLatency;
use crate::trace::{Status, TraceContext, Tracer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub stock: i64,
    pub price: f64,
}

impl Record for InventoryItem {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn seed() -> Vec<InventoryItem> {
    [(101, "Laptop", 50, 999.99), (102, "Mouse", 200, 49.99), (103, "Keyboard", 75, 79.99)]
        .into_iter()
        .map(|(id, name, stock, price)| InventoryItem {
            id,
            name: name.to_string(),
            stock,
            price,
        })
        .collect()
}

#[derive(Clone)]
pub struct InventoryState {
    pub store: Arc<Store<InventoryItem>>,
    pub tracer: Tracer,
    pub latency: SimulatedLatency,
}

pub fn router(state: InventoryState) -> Router {
    Router::new()
        .route("/inventory", get(list_inventory))
        .route("/inventory/{id}", get(get_product))
        .route("/", get(list_inventory))
        .route("/{id}", get(get_product))
        .with_state(state)
}

async fn list_inventory(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<TraceContext>,
) -> Json<Vec<InventoryItem>> {
    let (_, mut span) = state.tracer.start_span(&ctx, "get_all_inventory");
    state.latency.pause().await;

    let items = state.store.list().await;
    span.set_attribute("inventory.items_count", items.len() as i64);
    span.set_attribute("operation.type", "read");
    span.set_status(Status::Ok);
    span.end();
    Json(items)
}

async fn get_product(
    State(state): State<InventoryState>,
    Extension(ctx): Extension<TraceContext>,
    Path(id): Path<String>,
) -> Result<Json<InventoryItem>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::Validation("invalid product id".to_string()))?;

    let (_, mut span) = state.tracer.start_span(&ctx, "get_inventory_by_product");
    span.set_attribute("product.id", id);
    span.set_attribute("operation.type", "read");
    state.latency.pause_brief().await;

    let Some(item) = state.store.get(id).await else {
        let err = ApiError::NotFound("product not found".to_string());
        span.fail(&err);
        span.end();
        return Err(err);
    };
    span.set_attribute("product.stock", item.stock);
    span.set_attribute("product.name", item.name.clone());
    span.set_status(Status::Ok);
    span.end();
    Ok(Json(item))
}
