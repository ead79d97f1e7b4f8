//! NeuroNote Store: SQLite persistence for users, documents, notes,
//! flashcards, chat history and notebook annotations.
//!
//! The schema declares no foreign keys; deletions cascade through
//! [`cascade`] inside a single transaction.

mod cascade;
pub mod chat;
pub mod credentials;
pub mod documents;
pub mod flashcards;
pub mod notebook;
pub mod notes;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod users;

#[cfg(test)]
mod testutil;

pub use sqlite::SqliteStore;
pub use types::*;
