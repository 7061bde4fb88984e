//! Route table.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// The full HTTP surface with tracing and permissive CORS for the chat UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/llm", post(handlers::llm))
        .route("/api/llm/stream", post(handlers::llm_stream))
        .route("/api/llm/status", get(handlers::status))
        .route("/api/embeddings", post(handlers::embeddings))
        .route("/api/similarity", post(handlers::similarity))
        .route("/api/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
