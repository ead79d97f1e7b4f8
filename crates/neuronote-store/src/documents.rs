//! Uploaded-document registry.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cascade;
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::users::find_user;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

pub(crate) fn find_document(conn: &Connection, document_id: i64) -> Result<Option<Document>> {
    conn.prepare_cached("SELECT * FROM documents WHERE id = ?1")
        .map_err(db_err)?
        .query_row(params![document_id], SqliteStore::row_to_document)
        .optional()
        .map_err(db_err)
}

fn document_for_owner(conn: &Connection, document_id: i64, owner_id: i64) -> Result<Document> {
    conn.prepare_cached("SELECT * FROM documents WHERE id = ?1 AND owner_id = ?2")
        .map_err(db_err)?
        .query_row(params![document_id, owner_id], SqliteStore::row_to_document)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::NotFound(format!("Document {}", document_id)))
}

impl SqliteStore {
    /// Record an uploaded file. `key` must be unique across all documents.
    pub fn register_upload(
        &self,
        owner_id: Option<i64>,
        display_name: &str,
        key: &str,
        storage_path: &str,
    ) -> Result<Document> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::MissingField("name".into()));
        }

        let doc = self.write_tx(|tx| {
            if let Some(owner_id) = owner_id {
                if find_user(tx, owner_id)?.is_none() {
                    return Err(Error::NotFound(format!("User {}", owner_id)));
                }
            }
            let id = tx
                .prepare_cached(
                    "INSERT INTO documents (doc_key, display_name, owner_id, storage_path, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?
                .insert(params![key, display_name, owner_id, storage_path, now_millis()])
                .map_err(|e| {
                    if e.to_string().contains("UNIQUE constraint") {
                        Error::DuplicateKey(key.to_string())
                    } else {
                        db_err(e)
                    }
                })?;
            find_document(tx, id)?
                .ok_or_else(|| Error::Internal(format!("Document {} vanished after insert", id)))
        })?;

        info!("Registered document {} ({})", doc.display_name, doc.key);
        Ok(doc)
    }

    pub fn get_document(&self, document_id: i64) -> Result<Option<Document>> {
        self.with_conn(|conn| find_document(conn, document_id))
    }

    /// `NotFound` unless the document exists and belongs to `owner_id`.
    pub fn get_document_for_owner(&self, document_id: i64, owner_id: i64) -> Result<Document> {
        self.with_conn(|conn| document_for_owner(conn, document_id, owner_id))
    }

    /// Newest first.
    pub fn list_documents(&self, owner_id: i64) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let docs = conn
                .prepare_cached(
                    "SELECT * FROM documents WHERE owner_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .map_err(db_err)?
                .query_map(params![owner_id], Self::row_to_document)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            debug!("Listed {} documents for user {}", docs.len(), owner_id);
            Ok(docs)
        })
    }

    /// Documents of `owner_id` that no note has been generated from yet.
    pub fn list_unprocessed_documents(&self, owner_id: i64) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT d.* FROM documents d
                 WHERE d.owner_id = ?1
                   AND NOT EXISTS (SELECT 1 FROM notes n WHERE n.document_id = d.id)
                 ORDER BY d.created_at DESC, d.id DESC",
            )
            .map_err(db_err)?
            .query_map(params![owner_id], Self::row_to_document)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
        })
    }

    /// Delete a document with every note generated from it.
    pub fn delete_document(&self, document_id: i64, owner_id: i64) -> Result<CascadeReport> {
        let report = self.write_tx(|tx| {
            let doc = document_for_owner(tx, document_id, owner_id)?;
            cascade::delete_document(tx, &doc)
        })?;
        info!(
            "Deleted document {}: {} notes, {} flashcards removed",
            document_id, report.notes, report.flashcards
        );
        Ok(report)
    }
}
