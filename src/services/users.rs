//! User service.

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
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl Record for User {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn seed() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
        },
        User {
            id: 2,
            name: "Jane Smith".to_string(),
            email: "jane@example.com".to_string(),
        },
    ]
}

#[derive(Clone)]
pub struct UsersState {
    pub store: Arc<Store<User>>,
    pub tracer: Tracer,
    pub latency: SimulatedLatency,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
        .with_state(state)
}

async fn list_users(
    State(state): State<UsersState>,
    Extension(ctx): Extension<TraceContext>,
) -> Json<Vec<User>> {
    let (_, mut span) = state.tracer.start_span(&ctx, "get_all_users");
    state.latency.pause().await;

    let users = state.store.list().await;
    span.set_attribute("user.count", users.len() as i64);
    span.set_attribute("operation.type", "read");
    span.set_status(Status::Ok);
    span.end();
    Json(users)
}

async fn get_user(
    State(state): State<UsersState>,
    Extension(ctx): Extension<TraceContext>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::Validation("invalid user id".to_string()))?;

    let (_, mut span) = state.tracer.start_span(&ctx, "get_user_by_id");
    span.set_attribute("user.id", id);
    span.set_attribute("operation.type", "read");
    state.latency.pause_brief().await;

    match state.store.get(id).await {
        Some(user) => {
            span.set_status(Status::Ok);
            span.end();
            Ok(Json(user))
        }
        None => {
            let err = ApiError::NotFound("user not found".to_string());
            span.fail(&err);
            span.end();
            Err(err)
        }
    }
}
