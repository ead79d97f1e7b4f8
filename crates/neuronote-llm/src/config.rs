//! LLM configuration persistence and provider selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{AssistantStatus, LLMProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// LLM configuration as read from llm-config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// The provider a request will go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> usize {
    1500
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config = Self::load_file(config_path);
        if config.openai_api_key.is_none() {
            config.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = non_empty_env("GROQ_API_KEY");
        }
        config
    }

    /// Load config from file only. A missing or unreadable file yields defaults.
    pub fn load_file(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        }
    }

    /// Resolve which provider and model to use.
    ///
    /// An explicit preference only resolves when its key is set. In auto mode
    /// the order is Anthropic, Groq, OpenAI.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        let candidate = |provider: LLMProvider| -> Option<ResolvedProvider> {
            let (key, model) = match provider {
                LLMProvider::OpenAI => (&self.openai_api_key, &self.openai_model),
                LLMProvider::Anthropic => (&self.anthropic_api_key, &self.anthropic_model),
                LLMProvider::Groq => (&self.groq_api_key, &self.groq_model),
            };
            key.as_ref().map(|k| ResolvedProvider {
                provider,
                model: model.clone(),
                api_key: k.clone(),
            })
        };

        match self.preferred_provider.as_str() {
            "auto" => [LLMProvider::Anthropic, LLMProvider::Groq, LLMProvider::OpenAI]
                .into_iter()
                .find_map(candidate),
            "openai" => candidate(LLMProvider::OpenAI),
            "anthropic" => candidate(LLMProvider::Anthropic),
            "groq" => candidate(LLMProvider::Groq),
            _ => None,
        }
    }

    pub fn status(&self) -> AssistantStatus {
        let resolved = self.resolve_provider();
        AssistantStatus {
            available: resolved.is_some(),
            provider: resolved.as_ref().map(|r| r.provider.to_string()),
            model: resolved.map(|r| r.model),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keyed() -> LLMConfig {
        LLMConfig {
            openai_api_key: Some("sk-openai".into()),
            groq_api_key: Some("gsk-groq".into()),
            ..LLMConfig::default()
        }
    }

    #[test]
    fn test_auto_prefers_groq_over_openai() {
        let resolved = keyed().resolve_provider().unwrap();
        assert_eq!(resolved.provider, LLMProvider::Groq);
        assert_eq!(resolved.model, DEFAULT_GROQ_MODEL);

        let with_anthropic = LLMConfig {
            anthropic_api_key: Some("sk-ant".into()),
            ..keyed()
        };
        assert_eq!(
            with_anthropic.resolve_provider().unwrap().provider,
            LLMProvider::Anthropic
        );
    }

    #[test]
    fn test_explicit_preference_needs_key() {
        let config = LLMConfig {
            preferred_provider: "openai".into(),
            ..keyed()
        };
        assert_eq!(config.resolve_provider().unwrap().api_key, "sk-openai");

        let missing = LLMConfig {
            preferred_provider: "anthropic".into(),
            ..keyed()
        };
        assert!(missing.resolve_provider().is_none());
        assert!(!missing.status().available);
    }

    #[test]
    fn test_load_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        std::fs::write(
            &path,
            r#"{"groq_api_key": "gsk-groq", "groq_model": "llama-3.1-8b-instant"}"#,
        )
        .unwrap();

        let loaded = LLMConfig::load_file(&path);
        assert_eq!(loaded.groq_model, "llama-3.1-8b-instant");
        assert_eq!(loaded.groq_api_key.as_deref(), Some("gsk-groq"));
        assert_eq!(loaded.preferred_provider, "auto");
        assert_eq!(loaded.max_tokens, 1500);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = LLMConfig::load_file(&dir.path().join("absent.json"));
        assert_eq!(loaded.openai_model, DEFAULT_OPENAI_MODEL);
        assert!(loaded.openai_api_key.is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded = LLMConfig::load_file(&path);
        assert_eq!(loaded.preferred_provider, "auto");
        assert!(loaded.resolve_provider().is_none());
    }
}
