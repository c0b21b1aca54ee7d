//! JSON API over [`SkillPortal`].
//!
//! Every route lives under `/api` and requires a bearer token. Successful
//! responses use the `{"status":"success","data":{..}}` envelope; failures
//! come from [`AppError`](crate::error::AppError).

mod auth;
mod extract;
mod faculty;
mod skills;
mod student;
mod team;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

pub use extract::{ApiJson, AuthUser};

use crate::auth::TokenAuthority;
use crate::store::PortalStore;
use crate::workflows::SkillPortal;

/// Shared handler state.
pub struct PortalState<S> {
    pub portal: Arc<SkillPortal<S>>,
    pub tokens: Arc<TokenAuthority>,
}

impl<S> Clone for PortalState<S> {
    fn clone(&self) -> Self {
        Self {
            portal: self.portal.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<S> PortalState<S> {
    pub fn new(portal: Arc<SkillPortal<S>>, tokens: Arc<TokenAuthority>) -> Self {
        Self { portal, tokens }
    }
}

pub fn portal_router<S>(state: PortalState<S>) -> Router
where
    S: PortalStore + 'static,
{
    let api = Router::new()
        .nest("/auth", auth::router::<S>())
        .nest("/skills", skills::router::<S>())
        .nest("/faculty", faculty::router::<S>())
        .nest("/student", student::router::<S>())
        .nest("/team", team::router::<S>());

    Router::new().nest("/api", api).with_state(state)
}

pub(crate) fn success(data: Value) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

pub(crate) fn created(data: Value) -> Response {
    (StatusCode::CREATED, success(data)).into_response()
}

pub(crate) fn listing<T: serde::Serialize>(key: &str, items: Vec<T>) -> Json<Value> {
    let mut data = serde_json::Map::new();
    let results = items.len();
    data.insert(key.to_string(), json!(items));
    Json(json!({ "status": "success", "results": results, "data": data }))
}
