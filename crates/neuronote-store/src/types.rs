//! Row types for users, documents, notes, derived content and the notebook.

use serde::{Deserialize, Serialize};

/// A user row. The password hash never leaves the store; see [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub last_username_change_at: Option<i64>,
    pub created_at: i64,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_username_change_at: Option<i64>,
    pub created_at: i64,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            last_username_change_at: user.last_username_change_at,
            created_at: user.created_at,
        }
    }
}

/// Input for registering a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A freshly issued bearer token together with its owner.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: i64,
}

/// Uploaded-document metadata. The file bytes live at `storage_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub key: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub created_at: i64,
}

/// A generated study note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    pub owner_id: i64,
    pub document_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardAnswer {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// A multiple-choice flashcard with its answers in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub title: String,
    pub question: String,
    pub owner_id: i64,
    pub note_id: i64,
    pub answers: Vec<FlashcardAnswer>,
    pub created_at: i64,
}

/// Answer input for [`crate::SqliteStore::create_flashcard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnswer {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub note_id: i64,
    pub owner_id: i64,
    pub role: ChatRole,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookPage {
    pub id: i64,
    pub owner_id: i64,
    pub page_number: i64,
    pub page_title: String,
}

/// A positioned piece of text on a notebook page that references a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub page_id: i64,
    pub page_number: i64,
    pub note_id: i64,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub sidebar: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAnnotation {
    pub page_number: i64,
    pub note_id: i64,
    pub text: String,
    pub sidebar: bool,
}

/// Partial update for an annotation. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationPatch {
    pub sidebar: Option<bool>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub text: Option<String>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.sidebar.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.text.is_none()
    }
}

/// What a cascade removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub notes: usize,
    pub flashcards: usize,
    pub answers: usize,
    pub chat_messages: usize,
    pub annotations: usize,
    pub pages: usize,
    pub renumbered_pages: usize,
    pub sessions: usize,
    pub users: usize,
    /// Documents removed, so the caller can drop their blobs.
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageDeletion {
    pub deleted_page_number: i64,
    pub report: CascadeReport,
}

/// Rows whose reference points at nothing. All zero on a healthy database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub notes_without_document: i64,
    pub notes_without_owner: i64,
    pub flashcards_without_note: i64,
    pub answers_without_flashcard: i64,
    pub chat_messages_without_note: i64,
    pub annotations_without_note: i64,
    pub annotations_without_page: i64,
    pub pages_without_owner: i64,
    pub documents_without_owner_row: i64,
    pub sessions_without_user: i64,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub users: i64,
    pub documents: i64,
    pub notes: i64,
    pub flashcards: i64,
    pub chat_messages: i64,
    pub pages: i64,
    pub annotations: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
