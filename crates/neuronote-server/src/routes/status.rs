//! Server and assistant status.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status: liveness, LLM availability and row counts.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let assistant = state.assistant.status();
    let stats = state.store.get_stats().ok();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "llmAvailable": assistant.available,
        "llmProvider": assistant.provider,
        "model": assistant.model,
        "databaseAvailable": stats.is_some(),
        "stats": stats,
    }))
}
