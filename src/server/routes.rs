//! Router definition for the receiving server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::receive;
use crate::server::state::AppState;

/// Build the router for chunk intake.
pub fn create_router(state: &AppState, body_limit: u64) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/upload/chunk", post(receive::handlers::upload_chunk))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(body_limit as usize))
}
