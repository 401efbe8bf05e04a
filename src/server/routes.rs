use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::state::ServerState;

/// Largest accepted upload; matches the upstream transcription limit.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Create the HTTP router with all routes.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Pipeline stages
        .route("/transcribe", post(handlers::transcribe))
        .route("/generate-code", post(handlers::generate_code))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
