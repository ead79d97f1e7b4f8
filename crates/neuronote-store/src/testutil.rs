use tempfile::TempDir;

use crate::{Document, NewUser, Note, SqliteStore, User};

pub(crate) fn test_store() -> (SqliteStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path()).unwrap();
    (store, dir)
}

pub(crate) fn new_user(username: &str) -> NewUser {
    NewUser {
        username: Some(username.to_string()),
        email: Some(format!("{}@example.com", username)),
        password: Some("password123".to_string()),
        first_name: None,
        last_name: None,
    }
}

pub(crate) fn seed_user(store: &SqliteStore, username: &str) -> User {
    store.register(new_user(username)).unwrap()
}

pub(crate) fn seed_document(store: &SqliteStore, owner_id: i64, name: &str) -> Document {
    let key = crate::credentials::generate_document_key();
    store
        .register_upload(Some(owner_id), name, &key, &format!("/tmp/{}.pdf", key))
        .unwrap()
}

pub(crate) fn seed_note(store: &SqliteStore, owner_id: i64, name: &str) -> (Document, Note) {
    let doc = seed_document(store, owner_id, name);
    let note = store
        .create_note(owner_id, doc.id, Some("Summary"), "Mitochondria make ATP.")
        .unwrap();
    (doc, note)
}
