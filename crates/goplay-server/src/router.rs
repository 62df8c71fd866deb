//! API router construction

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/format", post(handlers::format))
        .route("/status", get(handlers::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
