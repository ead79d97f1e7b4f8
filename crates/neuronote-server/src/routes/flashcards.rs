//! Flashcards generated from notes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use neuronote_core::Error;
use neuronote_store::Flashcard;

use crate::auth::AuthUser;
use crate::error::{ApiJson, ApiResult};
use crate::pipeline;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/flashcards", get(list_flashcards).post(generate_flashcard))
        .route("/flashcards/{id}", delete(delete_flashcard))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    note_id: Option<i64>,
}

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    note_id: Option<i64>,
}

/// GET /api/flashcards?note_id=
async fn list_flashcards(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let flashcards = state.store.list_flashcards(auth.id(), query.note_id)?;
    Ok(Json(json!({ "flashcards": flashcards })))
}

/// POST /api/flashcards {note_id}
async fn generate_flashcard(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<Flashcard>)> {
    let note_id = req
        .note_id
        .ok_or_else(|| Error::MissingField("note_id".into()))?;
    let card = pipeline::generate_flashcard(&state, auth.id(), note_id).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn delete_flashcard(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let report = state.store.delete_flashcard(id, auth.id())?;
    Ok(Json(json!({
        "message": "Flashcard deleted",
        "deleted": report,
    })))
}
