//! Child-first deletion for every owning relationship.
//!
//! Callers run these inside [`SqliteStore::write_tx`](crate::SqliteStore), so
//! a cascade either completes or leaves nothing changed.

use rusqlite::{params, Connection, Params};
use tracing::debug;

use crate::documents::find_document;
use crate::notebook::default_page_title;
use crate::sqlite::db_err;
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::Result;

fn exec(conn: &Connection, sql: &str, params: impl Params) -> Result<usize> {
    conn.prepare_cached(sql)
        .map_err(db_err)?
        .execute(params)
        .map_err(db_err)
}

fn ids(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<i64>> {
    conn.prepare_cached(sql)
        .map_err(db_err)?
        .query_map(params, |row| row.get(0))
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<i64>>>()
        .map_err(db_err)
}

pub(crate) fn purge_flashcard(
    conn: &Connection,
    flashcard_id: i64,
    report: &mut CascadeReport,
) -> Result<()> {
    report.answers += exec(
        conn,
        "DELETE FROM flashcard_answers WHERE flashcard_id = ?1",
        params![flashcard_id],
    )?;
    report.flashcards += exec(conn, "DELETE FROM flashcards WHERE id = ?1", params![flashcard_id])?;
    Ok(())
}

/// Answers, flashcards, chat messages, annotations, then the note itself.
fn purge_note(conn: &Connection, note_id: i64, report: &mut CascadeReport) -> Result<()> {
    report.answers += exec(
        conn,
        "DELETE FROM flashcard_answers
         WHERE flashcard_id IN (SELECT id FROM flashcards WHERE note_id = ?1)",
        params![note_id],
    )?;
    report.flashcards += exec(conn, "DELETE FROM flashcards WHERE note_id = ?1", params![note_id])?;
    report.chat_messages += exec(
        conn,
        "DELETE FROM chat_messages WHERE note_id = ?1",
        params![note_id],
    )?;
    report.annotations += exec(
        conn,
        "DELETE FROM notebook_annotations WHERE note_id = ?1",
        params![note_id],
    )?;
    report.notes += exec(conn, "DELETE FROM notes WHERE id = ?1", params![note_id])?;
    Ok(())
}

/// Remove a document once no note references it.
fn remove_if_orphaned(conn: &Connection, document_id: i64, report: &mut CascadeReport) -> Result<()> {
    let remaining: i64 = conn
        .prepare_cached("SELECT COUNT(*) FROM notes WHERE document_id = ?1")
        .map_err(db_err)?
        .query_row(params![document_id], |row| row.get(0))
        .map_err(db_err)?;
    if remaining > 0 {
        return Ok(());
    }
    if let Some(doc) = find_document(conn, document_id)? {
        exec(conn, "DELETE FROM documents WHERE id = ?1", params![document_id])?;
        debug!("Removed orphaned document {}", doc.key);
        report.documents.push(doc);
    }
    Ok(())
}

pub(crate) fn delete_note(conn: &Connection, note: &Note) -> Result<CascadeReport> {
    let mut report = CascadeReport::default();
    purge_note(conn, note.id, &mut report)?;
    remove_if_orphaned(conn, note.document_id, &mut report)?;
    Ok(report)
}

fn purge_document(conn: &Connection, doc: &Document, report: &mut CascadeReport) -> Result<()> {
    for note_id in ids(conn, "SELECT id FROM notes WHERE document_id = ?1", params![doc.id])? {
        purge_note(conn, note_id, report)?;
    }
    exec(conn, "DELETE FROM documents WHERE id = ?1", params![doc.id])?;
    report.documents.push(doc.clone());
    Ok(())
}

pub(crate) fn delete_document(conn: &Connection, doc: &Document) -> Result<CascadeReport> {
    let mut report = CascadeReport::default();
    purge_document(conn, doc, &mut report)?;
    Ok(report)
}

/// Shift every page after `deleted_number` down by one, lowest first, so the
/// UNIQUE(owner, page_number) index never sees two rows with the same number.
fn renumber_after(conn: &Connection, owner_id: i64, deleted_number: i64) -> Result<usize> {
    let later: Vec<(i64, i64)> = conn
        .prepare_cached(
            "SELECT id, page_number FROM notebook_pages
             WHERE owner_id = ?1 AND page_number > ?2
             ORDER BY page_number ASC",
        )
        .map_err(db_err)?
        .query_map(params![owner_id, deleted_number], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    for (page_id, number) in &later {
        let new_number = number - 1;
        exec(
            conn,
            "UPDATE notebook_pages SET page_number = ?1, page_title = ?2 WHERE id = ?3",
            params![new_number, default_page_title(new_number), page_id],
        )?;
    }
    Ok(later.len())
}

pub(crate) fn delete_page(conn: &Connection, page: &NotebookPage) -> Result<CascadeReport> {
    let mut report = CascadeReport::default();
    report.annotations += exec(
        conn,
        "DELETE FROM notebook_annotations WHERE page_id = ?1",
        params![page.id],
    )?;
    report.pages += exec(conn, "DELETE FROM notebook_pages WHERE id = ?1", params![page.id])?;
    report.renumbered_pages = renumber_after(conn, page.owner_id, page.page_number)?;
    Ok(report)
}

/// Everything the user owns, then the user row.
pub(crate) fn delete_user(conn: &Connection, user_id: i64) -> Result<CascadeReport> {
    let mut report = CascadeReport::default();

    for note_id in ids(conn, "SELECT id FROM notes WHERE owner_id = ?1", params![user_id])? {
        purge_note(conn, note_id, &mut report)?;
    }

    let docs = conn
        .prepare_cached("SELECT * FROM documents WHERE owner_id = ?1")
        .map_err(db_err)?
        .query_map(params![user_id], SqliteStore::row_to_document)
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;
    for doc in &docs {
        purge_document(conn, doc, &mut report)?;
    }

    report.annotations += exec(
        conn,
        "DELETE FROM notebook_annotations
         WHERE page_id IN (SELECT id FROM notebook_pages WHERE owner_id = ?1)",
        params![user_id],
    )?;
    report.pages += exec(
        conn,
        "DELETE FROM notebook_pages WHERE owner_id = ?1",
        params![user_id],
    )?;

    for flashcard_id in ids(conn, "SELECT id FROM flashcards WHERE owner_id = ?1", params![user_id])? {
        purge_flashcard(conn, flashcard_id, &mut report)?;
    }
    report.chat_messages += exec(
        conn,
        "DELETE FROM chat_messages WHERE owner_id = ?1",
        params![user_id],
    )?;

    report.sessions += exec(conn, "DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    exec(
        conn,
        "DELETE FROM password_reset_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    report.users += exec(conn, "DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(report)
}

/// Empty every table, children first.
pub(crate) fn purge_all(conn: &Connection) -> Result<CascadeReport> {
    let mut report = CascadeReport::default();
    report.documents = conn
        .prepare_cached("SELECT * FROM documents")
        .map_err(db_err)?
        .query_map([], SqliteStore::row_to_document)
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    report.answers = exec(conn, "DELETE FROM flashcard_answers", [])?;
    report.flashcards = exec(conn, "DELETE FROM flashcards", [])?;
    report.chat_messages = exec(conn, "DELETE FROM chat_messages", [])?;
    report.annotations = exec(conn, "DELETE FROM notebook_annotations", [])?;
    report.notes = exec(conn, "DELETE FROM notes", [])?;
    report.pages = exec(conn, "DELETE FROM notebook_pages", [])?;
    exec(conn, "DELETE FROM documents", [])?;
    report.sessions = exec(conn, "DELETE FROM sessions", [])?;
    exec(conn, "DELETE FROM password_reset_tokens", [])?;
    report.users = exec(conn, "DELETE FROM users", [])?;
    Ok(report)
}
