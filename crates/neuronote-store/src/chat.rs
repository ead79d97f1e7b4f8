//! Per-note chat history.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::notes::note_for_owner;
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

fn insert_message(
    conn: &Connection,
    owner_id: i64,
    note_id: i64,
    role: ChatRole,
    text: &str,
    created_at: i64,
) -> Result<ChatMessage> {
    let id = conn
        .prepare_cached(
            "INSERT INTO chat_messages (note_id, owner_id, role, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(db_err)?
        .insert(params![note_id, owner_id, role.as_str(), text, created_at])
        .map_err(db_err)?;
    Ok(ChatMessage {
        id,
        note_id,
        owner_id,
        role,
        text: text.to_string(),
        created_at,
    })
}

impl SqliteStore {
    /// Oldest first. `NotFound` unless the note belongs to `owner_id`.
    pub fn list_chat_messages(&self, owner_id: i64, note_id: i64) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            note_for_owner(conn, note_id, owner_id)?;
            let messages = conn
                .prepare_cached(
                    "SELECT * FROM chat_messages WHERE note_id = ?1 AND owner_id = ?2
                     ORDER BY created_at ASC, id ASC",
                )
                .map_err(db_err)?
                .query_map(params![note_id, owner_id], Self::row_to_chat_message)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            debug!("Loaded {} messages for note {}", messages.len(), note_id);
            Ok(messages)
        })
    }

    /// Persist a user message and the assistant's reply together.
    pub fn append_chat_exchange(
        &self,
        owner_id: i64,
        note_id: i64,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(ChatMessage, ChatMessage)> {
        if user_text.trim().is_empty() {
            return Err(Error::MissingField("message".into()));
        }
        self.write_tx(|tx| {
            note_for_owner(tx, note_id, owner_id)?;
            let now = now_millis();
            let question = insert_message(tx, owner_id, note_id, ChatRole::User, user_text, now)?;
            let answer =
                insert_message(tx, owner_id, note_id, ChatRole::Assistant, assistant_text, now)?;
            Ok((question, answer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_note, seed_user, test_store};

    #[test]
    fn test_exchange_round_trip_in_order() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");

        store.append_chat_exchange(alice.id, note.id, "first?", "one").unwrap();
        store.append_chat_exchange(alice.id, note.id, "second?", "two").unwrap();

        let history = store.list_chat_messages(alice.id, note.id).unwrap();
        let flat: Vec<(ChatRole, &str)> =
            history.iter().map(|m| (m.role, m.text.as_str())).collect();
        assert_eq!(
            flat,
            vec![
                (ChatRole::User, "first?"),
                (ChatRole::Assistant, "one"),
                (ChatRole::User, "second?"),
                (ChatRole::Assistant, "two"),
            ]
        );
    }

    #[test]
    fn test_empty_message_rejected() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");
        assert!(matches!(
            store.append_chat_exchange(alice.id, note.id, "  ", "x"),
            Err(Error::MissingField(_))
        ));
        assert!(store.list_chat_messages(alice.id, note.id).unwrap().is_empty());
    }

    #[test]
    fn test_other_users_note_not_found() {
        let (store, _dir) = test_store();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        let (_, note) = seed_note(&store, alice.id, "a.pdf");

        assert!(matches!(
            store.list_chat_messages(bob.id, note.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.append_chat_exchange(bob.id, note.id, "hi", "hello"),
            Err(Error::NotFound(_))
        ));
    }
}
