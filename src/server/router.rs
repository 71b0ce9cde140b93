use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, datastore, embeddings, feedback, health, login, messages, query};
use crate::state::AppState;

const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

/// Creates the application router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/create_chat", post(chat::create_chat))
        .route(
            "/upload",
            post(datastore::upload_file).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/create_embedding", get(embeddings::create_embedding))
        .route("/query", post(query::query))
        .route("/get_messages", post(messages::get_messages))
        .route("/create_feedback", post(feedback::create_feedback))
        .route("/login", get(login::login))
        .route("/oauth_code", get(login::oauth_code))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The front end is served from another origin.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
