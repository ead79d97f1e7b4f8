//! SQLite store: one connection behind a mutex, schema bootstrap, row mapping.
//!
//! Domain operations live in sibling modules (`users.rs`, `notes.rs`, ...) as
//! further `impl SqliteStore` blocks. Every multi-statement mutation goes
//! through [`SqliteStore::write_tx`], which takes an IMMEDIATE transaction so
//! a failed step leaves no partial rows behind.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use tracing::info;

use crate::cascade;
use crate::schema::{CONTENT_SCHEMA_SQL, IDENTITY_SCHEMA_SQL, NOTEBOOK_SCHEMA_SQL};
use crate::types::*;
use neuronote_core::{Error, Result};

/// SQLite-backed persistence for every NeuroNote entity.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

/// Convert a driver error into the crate error.
pub(crate) fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/neuronote.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("neuronote.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} users, {} documents, {} notes, path={}",
            stats.users,
            stats.documents,
            stats.notes,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -16384;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!(
            "{}\n{}\n{}",
            IDENTITY_SCHEMA_SQL, CONTENT_SCHEMA_SQL, NOTEBOOK_SCHEMA_SQL
        );
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` with the connection locked. For single-statement reads and writes.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction. Commits on `Ok`, rolls back on `Err`.
    pub(crate) fn write_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let out = f(&tx)?;
        tx.commit().map_err(db_err)?;
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Stats and maintenance
    // ---------------------------------------------------------------

    pub fn get_stats(&self) -> Result<StoreStats> {
        let (users, documents, notes, flashcards, chat_messages, pages, annotations) = self
            .with_conn(|conn| {
                let count = |table: &str| -> Result<i64> {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })
                    .map_err(db_err)
                };
                Ok((
                    count("users")?,
                    count("documents")?,
                    count("notes")?,
                    count("flashcards")?,
                    count("chat_messages")?,
                    count("notebook_pages")?,
                    count("notebook_annotations")?,
                ))
            })?;

        let db_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            users,
            documents,
            notes,
            flashcards,
            chat_messages,
            pages,
            annotations,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    /// Count rows whose reference no longer resolves.
    pub fn integrity_report(&self) -> Result<IntegrityReport> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<i64> {
                conn.query_row(sql, [], |row| row.get(0)).map_err(db_err)
            };
            Ok(IntegrityReport {
                notes_without_document: count(
                    "SELECT COUNT(*) FROM notes WHERE document_id NOT IN (SELECT id FROM documents)",
                )?,
                notes_without_owner: count(
                    "SELECT COUNT(*) FROM notes WHERE owner_id NOT IN (SELECT id FROM users)",
                )?,
                flashcards_without_note: count(
                    "SELECT COUNT(*) FROM flashcards WHERE note_id NOT IN (SELECT id FROM notes)",
                )?,
                answers_without_flashcard: count(
                    "SELECT COUNT(*) FROM flashcard_answers
                     WHERE flashcard_id NOT IN (SELECT id FROM flashcards)",
                )?,
                chat_messages_without_note: count(
                    "SELECT COUNT(*) FROM chat_messages WHERE note_id NOT IN (SELECT id FROM notes)",
                )?,
                annotations_without_note: count(
                    "SELECT COUNT(*) FROM notebook_annotations
                     WHERE note_id NOT IN (SELECT id FROM notes)",
                )?,
                annotations_without_page: count(
                    "SELECT COUNT(*) FROM notebook_annotations
                     WHERE page_id NOT IN (SELECT id FROM notebook_pages)",
                )?,
                pages_without_owner: count(
                    "SELECT COUNT(*) FROM notebook_pages WHERE owner_id NOT IN (SELECT id FROM users)",
                )?,
                documents_without_owner_row: count(
                    "SELECT COUNT(*) FROM documents
                     WHERE owner_id IS NOT NULL AND owner_id NOT IN (SELECT id FROM users)",
                )?,
                sessions_without_user: count(
                    "SELECT COUNT(*) FROM sessions WHERE user_id NOT IN (SELECT id FROM users)",
                )?,
            })
        })
    }

    /// Delete every row in every table. Returns the removed documents so
    /// their blobs can be removed too.
    pub fn purge_all(&self) -> Result<CascadeReport> {
        let report = self.write_tx(|tx| cascade::purge_all(tx))?;
        info!(
            "Purged store: {} users, {} notes, {} documents",
            report.users,
            report.notes,
            report.documents.len()
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    pub(crate) fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            last_username_change_at: row.get("last_username_change_at")?,
            created_at: row.get("created_at")?,
        })
    }

    pub(crate) fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        Ok(Document {
            id: row.get("id")?,
            key: row.get("doc_key")?,
            display_name: row.get("display_name")?,
            owner_id: row.get("owner_id")?,
            storage_path: row.get("storage_path")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Expects the column set of [`crate::notes::NOTE_SELECT`].
    pub(crate) fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get("id")?,
            title: row.get("title")?,
            text: row.get("text")?,
            owner_id: row.get("owner_id")?,
            document_id: row.get("document_id")?,
            document_key: row.get("document_key")?,
            document_name: row.get("document_name")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Answers are filled in separately.
    pub(crate) fn row_to_flashcard(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
        Ok(Flashcard {
            id: row.get("id")?,
            title: row.get("title")?,
            question: row.get("question")?,
            owner_id: row.get("owner_id")?,
            note_id: row.get("note_id")?,
            answers: Vec::new(),
            created_at: row.get("created_at")?,
        })
    }

    pub(crate) fn row_to_answer(row: &Row<'_>) -> rusqlite::Result<FlashcardAnswer> {
        Ok(FlashcardAnswer {
            id: row.get("id")?,
            text: row.get("answer_text")?,
            is_correct: row.get("is_correct")?,
        })
    }

    pub(crate) fn row_to_chat_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
        let role: String = row.get("role")?;
        Ok(ChatMessage {
            id: row.get("id")?,
            note_id: row.get("note_id")?,
            owner_id: row.get("owner_id")?,
            role: ChatRole::parse(&role).unwrap_or(ChatRole::User),
            text: row.get("text")?,
            created_at: row.get("created_at")?,
        })
    }

    pub(crate) fn row_to_page(row: &Row<'_>) -> rusqlite::Result<NotebookPage> {
        Ok(NotebookPage {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            page_number: row.get("page_number")?,
            page_title: row.get("page_title")?,
        })
    }

    /// Expects the column set of [`crate::notebook::ANNOTATION_SELECT`].
    pub(crate) fn row_to_annotation(row: &Row<'_>) -> rusqlite::Result<Annotation> {
        Ok(Annotation {
            id: row.get("id")?,
            page_id: row.get("page_id")?,
            page_number: row.get("page_number")?,
            note_id: row.get("note_id")?,
            text: row.get("text")?,
            x: row.get("x")?,
            y: row.get("y")?,
            z: row.get("z")?,
            sidebar: row.get("sidebar")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{seed_note, seed_user, test_store};

    #[test]
    fn test_open_creates_db_file() {
        let (store, dir) = test_store();
        assert!(store.db_path().starts_with(dir.path()));
        assert!(store.db_path().exists());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = super::SqliteStore::open(dir.path()).unwrap();
            seed_user(&store, "alice");
        }
        let store = super::SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.get_stats().unwrap().users, 1);
    }

    #[test]
    fn test_stats_and_integrity() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        seed_note(&store, alice.id, "doc.pdf");

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.notes, 1);
        assert!(store.integrity_report().unwrap().is_clean());
    }

    #[test]
    fn test_purge_all_empties_everything() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "doc.pdf");
        store.get_or_create_page(alice.id, 1).unwrap();
        store
            .create_annotation(
                alice.id,
                crate::NewAnnotation {
                    page_number: 1,
                    note_id: note.id,
                    text: "remember".into(),
                    sidebar: true,
                },
            )
            .unwrap();

        let report = store.purge_all().unwrap();
        assert_eq!(report.users, 1);
        assert_eq!(report.documents.len(), 1);

        let stats = store.get_stats().unwrap();
        assert_eq!(
            (stats.users, stats.documents, stats.notes, stats.pages, stats.annotations),
            (0, 0, 0, 0, 0)
        );
    }
}
