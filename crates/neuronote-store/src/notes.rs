//! Study notes generated from documents.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::cascade;
use crate::documents::find_document;
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

/// Note columns plus the parent document's key and name.
pub(crate) const NOTE_SELECT: &str = "SELECT n.id, n.title, n.text, n.owner_id, n.document_id, n.created_at,
        d.doc_key AS document_key, d.display_name AS document_name
 FROM notes n LEFT JOIN documents d ON d.id = n.document_id";

/// `NotFound` unless the note exists and belongs to `owner_id`.
pub(crate) fn note_for_owner(conn: &Connection, note_id: i64, owner_id: i64) -> Result<Note> {
    conn.prepare_cached(&format!("{} WHERE n.id = ?1 AND n.owner_id = ?2", NOTE_SELECT))
        .map_err(db_err)?
        .query_row(params![note_id, owner_id], SqliteStore::row_to_note)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::NotFound(format!("Note {}", note_id)))
}

impl SqliteStore {
    /// Persist a note for `document_id`. The document must exist and belong
    /// to `owner_id`.
    pub fn create_note(
        &self,
        owner_id: i64,
        document_id: i64,
        title: Option<&str>,
        text: &str,
    ) -> Result<Note> {
        if text.trim().is_empty() {
            return Err(Error::Validation("Note text must not be empty".into()));
        }
        let title = title.map(str::trim).filter(|t| !t.is_empty());

        let note = self.write_tx(|tx| {
            let doc = find_document(tx, document_id)?
                .ok_or_else(|| Error::NotFound(format!("Document {}", document_id)))?;
            if doc.owner_id != Some(owner_id) {
                return Err(Error::Forbidden(
                    "Document belongs to another user".into(),
                ));
            }
            let id = tx
                .prepare_cached(
                    "INSERT INTO notes (title, text, owner_id, document_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?
                .insert(params![title, text, owner_id, document_id, now_millis()])
                .map_err(db_err)?;
            note_for_owner(tx, id, owner_id)
        })?;

        info!("Created note {} from document {}", note.id, document_id);
        Ok(note)
    }

    pub fn get_note_for_owner(&self, note_id: i64, owner_id: i64) -> Result<Note> {
        self.with_conn(|conn| note_for_owner(conn, note_id, owner_id))
    }

    /// Newest first, each with its document key and name.
    pub fn list_notes(&self, owner_id: i64) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            conn.prepare_cached(&format!(
                "{} WHERE n.owner_id = ?1 ORDER BY n.created_at DESC, n.id DESC",
                NOTE_SELECT
            ))
            .map_err(db_err)?
            .query_map(params![owner_id], Self::row_to_note)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
        })
    }

    pub fn count_notes_for_document(&self, document_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM notes WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .map_err(db_err)
        })
    }

    /// Delete a note and its derived content. The parent document goes too
    /// once no note references it.
    pub fn delete_note(&self, note_id: i64, owner_id: i64) -> Result<CascadeReport> {
        let report = self.write_tx(|tx| {
            let note = note_for_owner(tx, note_id, owner_id)?;
            cascade::delete_note(tx, &note)
        })?;
        info!(
            "Deleted note {}: {} flashcards, {} messages, {} annotations, {} documents",
            note_id,
            report.flashcards,
            report.chat_messages,
            report.annotations,
            report.documents.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_document, seed_note, seed_user, test_store};

    #[test]
    fn test_create_and_list_with_document_info() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (doc, note) = seed_note(&store, alice.id, "cells.pdf");

        assert_eq!(note.title.as_deref(), Some("Summary"));
        assert_eq!(note.document_key.as_deref(), Some(doc.key.as_str()));
        assert_eq!(note.document_name.as_deref(), Some("cells.pdf"));

        let later = store.create_note(alice.id, doc.id, None, "More").unwrap();
        assert!(later.title.is_none());
        let notes = store.list_notes(alice.id).unwrap();
        assert_eq!(notes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![later.id, note.id]);
    }

    #[test]
    fn test_create_requires_owned_document() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        let doc = seed_document(&store, alice.id, "a.pdf");

        assert!(matches!(
            store.create_note(bob.id, doc.id, None, "text"),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            store.create_note(alice.id, 999, None, "text"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.create_note(alice.id, doc.id, None, "   "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_ownership_isolation() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");

        assert!(store.list_notes(bob.id).unwrap().is_empty());
        assert!(matches!(
            store.get_note_for_owner(note.id, bob.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.delete_note(note.id, bob.id),
            Err(Error::NotFound(_))
        ));
        assert!(store.get_note_for_owner(note.id, alice.id).is_ok());
    }

    #[test]
    fn test_orphan_document_removed_with_last_note() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (doc, first) = seed_note(&store, alice.id, "a.pdf");
        let second = store.create_note(alice.id, doc.id, None, "again").unwrap();

        let report = store.delete_note(first.id, alice.id).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(store.count_notes_for_document(doc.id).unwrap(), 1);
        assert!(store.get_document(doc.id).unwrap().is_some());

        let report = store.delete_note(second.id, alice.id).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert!(store.get_document(doc.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_note_removes_all_dependents() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");
        store
            .create_flashcard(
                alice.id,
                note.id,
                "Q?",
                &[
                    NewAnswer { text: "yes".into(), correct: true },
                    NewAnswer { text: "no".into(), correct: false },
                ],
            )
            .unwrap();
        store.append_chat_exchange(alice.id, note.id, "hi", "hello").unwrap();
        for page in [1, 2] {
            store
                .create_annotation(
                    alice.id,
                    NewAnnotation {
                        page_number: page,
                        note_id: note.id,
                        text: "see note".into(),
                        sidebar: page == 1,
                    },
                )
                .unwrap();
        }

        let report = store.delete_note(note.id, alice.id).unwrap();
        assert_eq!(report.notes, 1);
        assert_eq!(report.flashcards, 1);
        assert_eq!(report.answers, 2);
        assert_eq!(report.chat_messages, 2);
        assert_eq!(report.annotations, 2);

        // Pages survive; only their annotations go.
        assert_eq!(store.list_pages(alice.id).unwrap().len(), 2);
        assert!(store.list_flashcards(alice.id, None).unwrap().is_empty());
        assert!(store.integrity_report().unwrap().is_clean());
    }
}
