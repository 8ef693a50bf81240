//! Health check endpoint for monitoring probes

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Always OK while the server is running
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
