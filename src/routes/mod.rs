use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::MatchStore,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::match_runner::MatchRunner,
};

pub mod matches;

/// Shared state for all handlers
pub struct AppState {
    pub runner: Arc<MatchRunner>,
    pub store: Arc<dyn MatchStore>,
    /// Run matches before responding instead of in the background
    pub inline_matching: bool,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/matches", post(matches::create_match))
        .route("/matches/:id", get(matches::get_match))
        .route("/matches/:id/status", get(matches::match_status))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
