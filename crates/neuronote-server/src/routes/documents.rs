//! Document upload, listing and deletion.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use neuronote_core::ErrorClass;
use neuronote_ingest::{remove_blob, sanitize_filename, save_upload};
use neuronote_store::credentials::generate_document_key;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pipeline;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .route("/pdfs", get(list_documents))
        .route("/pdfs/{id}", delete(delete_document))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    unprocessed: bool,
}

/// POST /api/upload: multipart with one file field.
///
/// Stores the file, registers the document and generates its note. A failed
/// generation keeps the document and answers 200 with `status: "warning"`.
async fn upload(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        let bytes = field.bytes().await?;
        file = Some((name, bytes.to_vec()));
        break;
    }
    let Some((display_name, bytes)) = file else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let key = generate_document_key();
    let path = save_upload(&state.config.data_paths.uploads, &key, &display_name, &bytes)?;
    let storage_path = path.to_string_lossy().to_string();
    let document = match state
        .store
        .register_upload(Some(auth.id()), &display_name, &key, &storage_path)
    {
        Ok(doc) => doc,
        Err(e) => {
            if let Err(cleanup) = remove_blob(&path) {
                warn!("Could not remove orphaned upload {}: {}", path.display(), cleanup);
            }
            return Err(e.into());
        }
    };
    info!(
        "User {} uploaded {} ({} bytes)",
        auth.id(),
        document.display_name,
        bytes.len()
    );

    match pipeline::generate_and_create(&state, auth.id(), document.id).await {
        Ok(note) => Ok(Json(json!({
            "status": "success",
            "message": "File uploaded successfully",
            "document": document,
            "note": note,
        }))),
        Err(e) if e.class() == ErrorClass::Upstream => {
            warn!("Note generation failed for {}: {}", document.key, e);
            Ok(Json(json!({
                "status": "warning",
                "message": format!("File uploaded, but note generation failed: {}", e),
                "document": document,
            })))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/pdfs: newest first; `?unprocessed=true` lists only documents
/// without a note.
async fn list_documents(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let documents = if query.unprocessed {
        state.store.list_unprocessed_documents(auth.id())?
    } else {
        state.store.list_documents(auth.id())?
    };
    Ok(Json(json!({
        "total": documents.len(),
        "pdfs": documents,
    })))
}

/// DELETE /api/pdfs/{id}: removes the document with all its notes.
async fn delete_document(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let report = state.store.delete_document(id, auth.id())?;
    pipeline::remove_document_blobs(&report.documents);
    Ok(Json(json!({
        "message": "Document deleted",
        "deleted": report,
    })))
}
