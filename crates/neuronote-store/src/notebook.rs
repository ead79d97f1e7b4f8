//! Notebook pages and annotations.
//!
//! An owner's pages are always numbered densely `1..=N`. Pages are only ever
//! appended at `N + 1`, and deleting a page shifts every later page down by
//! one inside the same transaction.

use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cascade;
use crate::notes::note_for_owner;
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

/// Annotation columns plus the page number of the parent page.
pub(crate) const ANNOTATION_SELECT: &str =
    "SELECT a.id, a.page_id, p.page_number, a.note_id, a.text, a.x, a.y, a.z, a.sidebar, a.created_at
 FROM notebook_annotations a JOIN notebook_pages p ON p.id = a.page_id";

pub fn default_page_title(page_number: i64) -> String {
    format!("Page {}", page_number)
}

fn page_count(conn: &Connection, owner_id: i64) -> Result<i64> {
    conn.prepare_cached("SELECT COUNT(*) FROM notebook_pages WHERE owner_id = ?1")
        .map_err(db_err)?
        .query_row(params![owner_id], |row| row.get(0))
        .map_err(db_err)
}

fn page_by_number(conn: &Connection, owner_id: i64, page_number: i64) -> Result<Option<NotebookPage>> {
    conn.prepare_cached("SELECT * FROM notebook_pages WHERE owner_id = ?1 AND page_number = ?2")
        .map_err(db_err)?
        .query_row(params![owner_id, page_number], SqliteStore::row_to_page)
        .optional()
        .map_err(db_err)
}

fn insert_page(conn: &Connection, owner_id: i64, page_number: i64, title: &str) -> Result<NotebookPage> {
    let id = conn
        .prepare_cached(
            "INSERT INTO notebook_pages (owner_id, page_number, page_title) VALUES (?1, ?2, ?3)",
        )
        .map_err(db_err)?
        .insert(params![owner_id, page_number, title])
        .map_err(db_err)?;
    debug!("Created page {} for user {}", page_number, owner_id);
    Ok(NotebookPage {
        id,
        owner_id,
        page_number,
        page_title: title.to_string(),
    })
}

/// Existing page `n`, or a fresh `"Page n"` when `n` is the next number.
fn get_or_create_page_in(conn: &Connection, owner_id: i64, page_number: i64) -> Result<NotebookPage> {
    if page_number < 1 {
        return Err(Error::Validation("Page number must be at least 1".into()));
    }
    if let Some(page) = page_by_number(conn, owner_id, page_number)? {
        return Ok(page);
    }
    let next = page_count(conn, owner_id)? + 1;
    if page_number != next {
        return Err(Error::Validation(format!(
            "Page {} does not exist; the next page is {}",
            page_number, next
        )));
    }
    insert_page(conn, owner_id, page_number, &default_page_title(page_number))
}

fn annotation_for_owner(conn: &Connection, annotation_id: i64, owner_id: i64) -> Result<Annotation> {
    conn.prepare_cached(&format!("{} WHERE a.id = ?1 AND p.owner_id = ?2", ANNOTATION_SELECT))
        .map_err(db_err)?
        .query_row(params![annotation_id, owner_id], SqliteStore::row_to_annotation)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::NotFound(format!("Annotation {}", annotation_id)))
}

fn annotations_on_page(conn: &Connection, page_id: i64, sidebar: bool) -> Result<Vec<Annotation>> {
    conn.prepare_cached(&format!(
        "{} WHERE a.page_id = ?1 AND a.sidebar = ?2 ORDER BY a.created_at ASC, a.id ASC",
        ANNOTATION_SELECT
    ))
    .map_err(db_err)?
    .query_map(params![page_id, sidebar], SqliteStore::row_to_annotation)
    .map_err(db_err)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(db_err)
}

fn clean_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Validation("Annotation text must not be empty".into()));
    }
    Ok(text.to_string())
}

impl SqliteStore {
    /// Append a page. `page_number` defaults to the next free number and
    /// must equal it when given. A blank title becomes `"Page n"`.
    pub fn create_page(
        &self,
        owner_id: i64,
        page_number: Option<i64>,
        title: Option<&str>,
    ) -> Result<NotebookPage> {
        let page = self.write_tx(|tx| {
            let next = page_count(tx, owner_id)? + 1;
            let page_number = page_number.unwrap_or(next);
            if page_number < 1 {
                return Err(Error::Validation("Page number must be at least 1".into()));
            }
            if page_number < next {
                return Err(Error::Validation(format!(
                    "Page {} already exists",
                    page_number
                )));
            }
            if page_number > next {
                return Err(Error::Validation(format!(
                    "Pages are numbered sequentially; the next page is {}",
                    next
                )));
            }
            let title = match title.map(str::trim) {
                Some(t) if !t.is_empty() => t.to_string(),
                _ => default_page_title(page_number),
            };
            insert_page(tx, owner_id, page_number, &title)
        })?;
        info!("User {} added notebook page {}", owner_id, page.page_number);
        Ok(page)
    }

    pub fn get_or_create_page(&self, owner_id: i64, page_number: i64) -> Result<NotebookPage> {
        self.write_tx(|tx| get_or_create_page_in(tx, owner_id, page_number))
    }

    /// Ascending by page number.
    pub fn list_pages(&self, owner_id: i64) -> Result<Vec<NotebookPage>> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT * FROM notebook_pages WHERE owner_id = ?1 ORDER BY page_number ASC",
            )
            .map_err(db_err)?
            .query_map(params![owner_id], Self::row_to_page)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
        })
    }

    /// Delete a page with its annotations and close the numbering gap.
    pub fn delete_page(&self, page_id: i64, owner_id: i64) -> Result<PageDeletion> {
        let deletion = self.write_tx(|tx| {
            let page = tx
                .prepare_cached("SELECT * FROM notebook_pages WHERE id = ?1 AND owner_id = ?2")
                .map_err(db_err)?
                .query_row(params![page_id, owner_id], Self::row_to_page)
                .optional()
                .map_err(db_err)?
                .ok_or_else(|| Error::NotFound(format!("Page {}", page_id)))?;
            let report = cascade::delete_page(tx, &page)?;
            Ok(PageDeletion {
                deleted_page_number: page.page_number,
                report,
            })
        })?;
        info!(
            "User {} deleted page {} ({} later pages renumbered)",
            owner_id, deletion.deleted_page_number, deletion.report.renumbered_pages
        );
        Ok(deletion)
    }

    /// Place an annotation for an owned note on page `page_number`, creating
    /// that page when it is the next one.
    pub fn create_annotation(&self, owner_id: i64, new: NewAnnotation) -> Result<Annotation> {
        let text = clean_text(&new.text)?;
        let annotation = self.write_tx(|tx| {
            note_for_owner(tx, new.note_id, owner_id)?;
            let page = get_or_create_page_in(tx, owner_id, new.page_number)?;
            let id = tx
                .prepare_cached(
                    "INSERT INTO notebook_annotations (page_id, note_id, text, sidebar, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(db_err)?
                .insert(params![page.id, new.note_id, text, new.sidebar, now_millis()])
                .map_err(db_err)?;
            annotation_for_owner(tx, id, owner_id)
        })?;
        debug!(
            "Annotation {} placed on page {}",
            annotation.id, annotation.page_number
        );
        Ok(annotation)
    }

    /// Annotations on page `page_number` with the given `sidebar` flag,
    /// oldest first.
    ///
    /// The sidebar view creates the page on demand (when it is the next
    /// page); the canvas view requires it to exist and fails `NotFound`.
    pub fn list_annotations(
        &self,
        owner_id: i64,
        page_number: i64,
        sidebar: bool,
    ) -> Result<Vec<Annotation>> {
        if sidebar {
            self.write_tx(|tx| {
                let page = get_or_create_page_in(tx, owner_id, page_number)?;
                annotations_on_page(tx, page.id, sidebar)
            })
        } else {
            self.with_conn(|conn| {
                let page = page_by_number(conn, owner_id, page_number)?
                    .ok_or_else(|| Error::NotFound(format!("Page {}", page_number)))?;
                annotations_on_page(conn, page.id, sidebar)
            })
        }
    }

    /// Change only the fields present in `patch`.
    pub fn update_annotation(
        &self,
        annotation_id: i64,
        owner_id: i64,
        patch: AnnotationPatch,
    ) -> Result<Annotation> {
        if patch.is_empty() {
            return Err(Error::Validation("No fields to update".into()));
        }
        let text = patch.text.as_deref().map(clean_text).transpose()?;

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(sidebar) = patch.sidebar {
            sets.push("sidebar = ?");
            values.push(Box::new(sidebar));
        }
        for (column, value) in [("x = ?", patch.x), ("y = ?", patch.y), ("z = ?", patch.z)] {
            if let Some(v) = value {
                sets.push(column);
                values.push(Box::new(v));
            }
        }
        if let Some(text) = text {
            sets.push("text = ?");
            values.push(Box::new(text));
        }
        values.push(Box::new(annotation_id));

        self.write_tx(|tx| {
            annotation_for_owner(tx, annotation_id, owner_id)?;
            let sql = format!(
                "UPDATE notebook_annotations SET {} WHERE id = ?",
                sets.join(", ")
            );
            tx.execute(&sql, params_from_iter(values.iter()))
                .map_err(db_err)?;
            annotation_for_owner(tx, annotation_id, owner_id)
        })
    }

    pub fn delete_annotation(&self, annotation_id: i64, owner_id: i64) -> Result<()> {
        self.write_tx(|tx| {
            annotation_for_owner(tx, annotation_id, owner_id)?;
            tx.execute(
                "DELETE FROM notebook_annotations WHERE id = ?1",
                params![annotation_id],
            )
            .map_err(db_err)?;
            Ok(())
        })?;
        debug!("Deleted annotation {}", annotation_id);
        Ok(())
    }
}
