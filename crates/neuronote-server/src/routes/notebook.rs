//! Notebook pages and the annotations placed on them.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use neuronote_core::Error;
use neuronote_store::{Annotation, AnnotationPatch, NewAnnotation, NotebookPage};

use crate::auth::AuthUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notebook/pages", get(list_pages).post(create_page))
        .route("/notebook/pages/{id}/delete", post(delete_page))
        .route("/notebook/annotations", post(create_annotation))
        // GET takes a page number; PATCH and DELETE take an annotation id.
        .route(
            "/notebook/annotations/{id}",
            get(list_annotations)
                .patch(update_annotation)
                .delete(delete_annotation),
        )
}

/// Accept an integer given as a JSON number or a numeric string.
fn parse_int(value: Option<&Value>, field: &str) -> Result<i64, Error> {
    let value = match value {
        None | Some(Value::Null) => return Err(Error::MissingField(field.to_string())),
        Some(v) => v,
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Validation(format!("{} must be an integer", field)))
}

#[derive(Deserialize)]
struct CreatePageRequest {
    #[serde(default)]
    page_number: Option<Value>,
    #[serde(default)]
    page_title: Option<String>,
}

#[derive(Deserialize)]
struct CreateAnnotationRequest {
    #[serde(default)]
    page_number: Option<Value>,
    #[serde(default)]
    note_id: Option<Value>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sidebar: Option<bool>,
}

#[derive(Deserialize)]
struct AnnotationQuery {
    #[serde(default)]
    sidebar: Option<bool>,
}

/// POST /api/notebook/pages: append the next page.
async fn create_page(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreatePageRequest>,
) -> ApiResult<(StatusCode, Json<NotebookPage>)> {
    let page_number = match req.page_number {
        None | Some(Value::Null) => None,
        Some(ref v) => Some(parse_int(Some(v), "page_number")?),
    };
    let page = state
        .store
        .create_page(auth.id(), page_number, req.page_title.as_deref())?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// GET /api/notebook/pages: ascending by page number.
async fn list_pages(State(state): State<Arc<AppState>>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let pages = state.store.list_pages(auth.id())?;
    Ok(Json(json!({ "pages": pages })))
}

/// POST /api/notebook/pages/{id}/delete: later pages move down by one.
async fn delete_page(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(page_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deletion = state.store.delete_page(page_id, auth.id())?;
    Ok(Json(json!({
        "message": "Page deleted",
        "deletedPageNumber": deletion.deleted_page_number,
        "renumbered": deletion.report.renumbered_pages,
        "annotations": deletion.report.annotations,
    })))
}

/// POST /api/notebook/annotations
async fn create_annotation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateAnnotationRequest>,
) -> ApiResult<(StatusCode, Json<Annotation>)> {
    let new = NewAnnotation {
        page_number: parse_int(req.page_number.as_ref(), "page_number")?,
        note_id: parse_int(req.note_id.as_ref(), "note_id")?,
        text: req.text.ok_or_else(|| Error::MissingField("text".into()))?,
        sidebar: req.sidebar.unwrap_or(true),
    };
    let annotation = state.store.create_annotation(auth.id(), new)?;
    Ok((StatusCode::CREATED, Json(annotation)))
}

/// GET /api/notebook/annotations/{page_number}?sidebar=true|false
///
/// The sidebar view (the default) creates the next page on demand; the
/// canvas view answers 404 for a page that does not exist.
async fn list_annotations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(page_number): Path<i64>,
    Query(query): Query<AnnotationQuery>,
) -> ApiResult<Json<Value>> {
    let sidebar = query.sidebar.unwrap_or(true);
    let annotations = state
        .store
        .list_annotations(auth.id(), page_number, sidebar)?;
    Ok(Json(json!({
        "page_number": page_number,
        "sidebar": sidebar,
        "annotations": annotations,
    })))
}

/// PATCH /api/notebook/annotations/{id}
async fn update_annotation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<AnnotationPatch>,
) -> ApiResult<Json<Annotation>> {
    Ok(Json(state.store.update_annotation(id, auth.id(), patch)?))
}

/// DELETE /api/notebook/annotations/{id}
async fn delete_annotation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.store.delete_annotation(id, auth.id())?;
    Ok(Json(json!({ "message": "Annotation deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_int(Some(&json!(3)), "page_number").unwrap(), 3);
        assert_eq!(parse_int(Some(&json!(" 12 ")), "note_id").unwrap(), 12);
    }

    #[test]
    fn test_parse_int_rejects_other_values() {
        assert!(matches!(
            parse_int(None, "note_id"),
            Err(Error::MissingField(f)) if f == "note_id"
        ));
        assert!(matches!(
            parse_int(Some(&Value::Null), "note_id"),
            Err(Error::MissingField(_))
        ));
        for bad in [json!("abc"), json!(1.5), json!(true), json!([1])] {
            assert!(matches!(
                parse_int(Some(&bad), "page_number"),
                Err(Error::Validation(_))
            ));
        }
    }
}
