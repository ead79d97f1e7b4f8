//! The study assistant: summaries, flashcards and tutoring replies.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use neuronote_core::{Error, Result};

use crate::config::{LLMConfig, ResolvedProvider};
use crate::flashcard::parse_flashcard;
use crate::prompts::{self, FLASHCARD_PROMPT, MAX_SOURCE_CHARS, SUMMARY_PROMPT};
use crate::providers;
use crate::types::{AssistantStatus, FlashcardDraft, NoteDraft, PromptMessage};

/// Generation collaborator used by the server.
#[async_trait]
pub trait StudyAssistant: Send + Sync {
    /// Summarize extracted document text into a titled note.
    async fn summarize(&self, text: &str) -> Result<NoteDraft>;

    /// Write one multiple-choice question about a note.
    async fn flashcard(&self, note_text: &str) -> Result<FlashcardDraft>;

    /// Answer `message` given the conversation so far. `history` starts with
    /// the system prompt.
    async fn reply(&self, history: &[PromptMessage], message: &str) -> Result<String>;

    fn status(&self) -> AssistantStatus;

    fn is_available(&self) -> bool {
        self.status().available
    }
}

/// [`StudyAssistant`] backed by the configured external provider.
pub struct LlmAssistant {
    client: Client,
    config: LLMConfig,
}

impl LlmAssistant {
    pub fn new(config: LLMConfig) -> Self {
        match config.resolve_provider() {
            Some(r) => info!("LLM provider: {} ({})", r.provider, r.model),
            None => warn!("No LLM API key configured; generation will fail until one is set"),
        }
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Load `llm-config.json` (plus env keys) from `path`.
    pub fn from_path(path: &Path) -> Self {
        Self::new(LLMConfig::load(path))
    }

    fn resolved(&self) -> Result<(ResolvedProvider, f64, usize)> {
        let config = &self.config;
        let resolved = config
            .resolve_provider()
            .ok_or_else(|| Error::GenerationFailed("No LLM provider configured".into()))?;
        Ok((resolved, config.temperature, config.max_tokens))
    }

    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let (resolved, temperature, max_tokens) = self.resolved()?;
        providers::complete(&self.client, &resolved, messages, temperature, max_tokens).await
    }
}

#[async_trait]
impl StudyAssistant for LlmAssistant {
    async fn summarize(&self, text: &str) -> Result<NoteDraft> {
        let messages = [
            PromptMessage::system(SUMMARY_PROMPT),
            PromptMessage::user(prompts::truncate_chars(text, MAX_SOURCE_CHARS)),
        ];
        let response = self.complete(&messages).await?;
        prompts::parse_note_draft(&response)
    }

    async fn flashcard(&self, note_text: &str) -> Result<FlashcardDraft> {
        let messages = [
            PromptMessage::system(FLASHCARD_PROMPT),
            PromptMessage::user(prompts::truncate_chars(note_text, MAX_SOURCE_CHARS)),
        ];
        let response = self.complete(&messages).await?;
        parse_flashcard(&response)
    }

    async fn reply(&self, history: &[PromptMessage], message: &str) -> Result<String> {
        let mut messages = history.to_vec();
        messages.push(PromptMessage::user(message));
        let response = self.complete(&messages).await?;
        Ok(response.trim().to_string())
    }

    fn status(&self) -> AssistantStatus {
        self.config.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> LlmAssistant {
        LlmAssistant::new(LLMConfig {
            preferred_provider: "openai".into(),
            ..LLMConfig::default()
        })
    }

    #[tokio::test]
    async fn test_unconfigured_assistant_fails_generation() {
        let assistant = unconfigured();
        assert!(!assistant.is_available());

        let err = assistant.summarize("Some text").await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(ref m) if m.contains("No LLM provider")));
        assert!(matches!(
            assistant.flashcard("note").await,
            Err(Error::GenerationFailed(_))
        ));
        assert!(matches!(
            assistant.reply(&[], "hi").await,
            Err(Error::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_configured_assistant_reports_provider() {
        let assistant = LlmAssistant::new(LLMConfig {
            preferred_provider: "openai".into(),
            openai_api_key: Some("sk-test".into()),
            ..LLMConfig::default()
        });
        assert!(assistant.is_available());
        let status = assistant.status();
        assert!(status.available);
        assert_eq!(status.provider.as_deref(), Some("openai"));
        assert_eq!(status.model.as_deref(), Some(crate::config::DEFAULT_OPENAI_MODEL));
    }
}
