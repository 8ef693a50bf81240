// Module: http
// Login redirect, provider callback and provider listing

pub mod error;
pub mod health;
pub mod oauth2;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use gcpanel_core::service::OAuth2Service;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub oauth2_service: Arc<OAuth2Service>,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/providers", get(oauth2::list_providers))
        .route("/auth/login/{provider}", get(oauth2::login))
        .route("/auth/callback/{provider}", get(oauth2::callback))
        .merge(health::create_health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
