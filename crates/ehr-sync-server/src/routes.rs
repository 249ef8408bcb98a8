use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::*;

/// Upper bound on an upload body.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/sync/upload", post(upload))
        .route("/sync/status", get(sync_status))
        .route("/metrics", get(metrics))
        .route("/patients", get(patients))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
