//! Per-note tutoring chat.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use neuronote_core::Error;

use crate::auth::AuthUser;
use crate::error::{ApiJson, ApiResult};
use crate::pipeline;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/notes/{id}/messages", get(list_messages).post(send_message))
}

#[derive(Deserialize)]
struct SendRequest {
    #[serde(default)]
    message: Option<String>,
}

/// GET /api/notes/{id}/messages: oldest first.
async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(note_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let messages = state.store.list_chat_messages(auth.id(), note_id)?;
    Ok(Json(json!({ "messages": messages })))
}

/// POST /api/notes/{id}/messages {message}
async fn send_message(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(note_id): Path<i64>,
    ApiJson(req): ApiJson<SendRequest>,
) -> ApiResult<Json<Value>> {
    let message = req
        .message
        .ok_or_else(|| Error::MissingField("message".into()))?;
    let (question, reply) = pipeline::send_message(&state, auth.id(), note_id, &message).await?;
    Ok(Json(json!({
        "message": question,
        "reply": reply,
    })))
}
