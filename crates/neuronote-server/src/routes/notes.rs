//! Study notes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use neuronote_core::Error;
use neuronote_store::Note;

use crate::auth::AuthUser;
use crate::error::{ApiJson, ApiResult};
use crate::pipeline;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notes", get(list_notes).post(generate_note))
        .route("/notes/{id}", get(get_note).delete(delete_note))
}

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    document_id: Option<i64>,
}

/// GET /api/notes: newest first.
async fn list_notes(State(state): State<Arc<AppState>>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let notes = state.store.list_notes(auth.id())?;
    Ok(Json(json!({ "notes": notes })))
}

/// POST /api/notes: (re)generate a note for an uploaded document.
async fn generate_note(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let document_id = req
        .document_id
        .ok_or_else(|| Error::MissingField("document_id".into()))?;
    let note = pipeline::generate_and_create(&state, auth.id(), document_id).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Note>> {
    Ok(Json(state.store.get_note_for_owner(id, auth.id())?))
}

/// DELETE /api/notes/{id}: also removes the document when this was its
/// last note.
async fn delete_note(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let report = state.store.delete_note(id, auth.id())?;
    pipeline::remove_document_blobs(&report.documents);
    Ok(Json(json!({
        "message": "Note deleted",
        "deleted": report,
    })))
}
