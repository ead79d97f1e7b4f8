//! HTTP route handlers, all nested under `/api`.

pub mod auth;
pub mod chat;
pub mod documents;
pub mod flashcards;
pub mod notebook;
pub mod notes;
pub mod status;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(auth::routes())
        .merge(documents::routes())
        .merge(notes::routes())
        .merge(flashcards::routes())
        .merge(chat::routes())
        .merge(notebook::routes())
}
