//! Generation pipeline: extraction and LLM calls around the store.
//!
//! The store lock is never held across an `.await`; every step that talks to
//! a collaborator runs between two independent store calls.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use neuronote_core::{Error, Result};
use neuronote_llm::{prompts, PromptMessage};
use neuronote_store::{ChatMessage, ChatRole, Document, Flashcard, NewAnswer, Note};

use crate::state::AppState;

/// Extract a document's text off the async runtime.
pub async fn extract_text(state: &AppState, doc: &Document) -> Result<String> {
    let extractor = state.extractor.clone();
    let path = PathBuf::from(&doc.storage_path);
    let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
        .await
        .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))??;
    if text.trim().is_empty() {
        return Err(Error::ExtractionFailed(format!(
            "No text could be extracted from {}",
            doc.display_name
        )));
    }
    Ok(text)
}

/// Summarize an owned document into a new note. No retry on failure.
pub async fn generate_and_create(state: &AppState, owner_id: i64, document_id: i64) -> Result<Note> {
    let doc = state
        .store
        .get_document(document_id)?
        .ok_or_else(|| Error::NotFound(format!("Document {}", document_id)))?;
    if doc.owner_id != Some(owner_id) {
        return Err(Error::Forbidden("Document belongs to another user".into()));
    }

    let text = extract_text(state, &doc).await?;
    let draft = state.assistant.summarize(&text).await?;
    let note = state
        .store
        .create_note(owner_id, doc.id, draft.title.as_deref(), &draft.text)?;
    info!(
        "Generated note {} from {} ({} chars of source)",
        note.id,
        doc.display_name,
        text.len()
    );
    Ok(note)
}

/// Ask the assistant for a multiple-choice question about an owned note.
pub async fn generate_flashcard(state: &AppState, owner_id: i64, note_id: i64) -> Result<Flashcard> {
    let note = state.store.get_note_for_owner(note_id, owner_id)?;
    let draft = state.assistant.flashcard(&note.text).await?;
    let answers: Vec<NewAnswer> = draft
        .answers
        .into_iter()
        .map(|a| NewAnswer {
            text: a.text,
            correct: a.correct,
        })
        .collect();
    state
        .store
        .create_flashcard(owner_id, note.id, &draft.question, &answers)
}

/// Prompt history for a note's chat: the note as system context, then the
/// stored conversation in order.
pub fn chat_history(note: &Note, messages: &[ChatMessage]) -> Vec<PromptMessage> {
    std::iter::once(PromptMessage::system(prompts::chat_system_prompt(&note.text)))
        .chain(messages.iter().map(|m| match m.role {
            ChatRole::User => PromptMessage::user(m.text.as_str()),
            ChatRole::Assistant => PromptMessage::assistant(m.text.as_str()),
        }))
        .collect()
}

/// Send a chat message about an owned note. Both sides of the exchange are
/// stored together once the reply arrives; a failed reply stores nothing.
pub async fn send_message(
    state: &AppState,
    owner_id: i64,
    note_id: i64,
    text: &str,
) -> Result<(ChatMessage, ChatMessage)> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::MissingField("message".into()));
    }
    let note = state.store.get_note_for_owner(note_id, owner_id)?;
    let history = chat_history(&note, &state.store.list_chat_messages(owner_id, note.id)?);

    let reply = state.assistant.reply(&history, text).await?;
    if reply.trim().is_empty() {
        return Err(Error::GenerationFailed("Assistant returned an empty reply".into()));
    }
    state
        .store
        .append_chat_exchange(owner_id, note.id, text, reply.trim())
}

/// Remove the blobs of documents a cascade deleted. Failures are logged
/// only; the rows are already gone.
pub fn remove_document_blobs(documents: &[Document]) {
    for doc in documents {
        if let Err(e) = neuronote_ingest::remove_blob(Path::new(&doc.storage_path)) {
            warn!("Could not remove blob for {}: {}", doc.key, e);
        }
    }
}
