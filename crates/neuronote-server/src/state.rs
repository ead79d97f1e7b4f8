//! Shared application state.

use std::sync::Arc;

use neuronote_core::{Error, NeuroNoteConfig, Result};
use neuronote_ingest::{FileExtractor, TextExtractor};
use neuronote_llm::{LlmAssistant, StudyAssistant};
use neuronote_store::SqliteStore;

use crate::mailer::{LogMailer, Mailer};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: NeuroNoteConfig,
    pub store: SqliteStore,
    pub assistant: Arc<dyn StudyAssistant>,
    pub extractor: Arc<dyn TextExtractor>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: NeuroNoteConfig,
        store: SqliteStore,
        assistant: Arc<dyn StudyAssistant>,
        extractor: Arc<dyn TextExtractor>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            store,
            assistant,
            extractor,
            mailer,
        }
    }

    /// Production wiring: SQLite under `data/db`, the LLM assistant from
    /// `llm-config.json`, file extraction, and log-only mail.
    pub fn open(config: NeuroNoteConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.data_paths.db)?;
        let assistant = Arc::new(LlmAssistant::from_path(&config.data_paths.llm_config_file));
        Ok(Self::new(
            config,
            store,
            assistant,
            Arc::new(FileExtractor),
            Arc::new(LogMailer),
        ))
    }

    /// Run a store call that hashes passwords on the blocking pool.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&AppState) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
    }

    pub fn session_ttl_ms(&self) -> i64 {
        self.config.token_ttl_hours * 60 * 60 * 1000
    }

    pub fn reset_ttl_ms(&self) -> i64 {
        self.config.reset_token_ttl_minutes * 60 * 1000
    }
}
