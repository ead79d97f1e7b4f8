//! Study assistant over external LLM APIs (OpenAI/Anthropic/Groq).
//!
//! Generates note summaries, multiple-choice flashcards and tutoring replies.
//! No local model is required.

pub mod assistant;
pub mod config;
pub mod flashcard;
pub mod prompts;
pub mod providers;
pub mod types;

pub use assistant::{LlmAssistant, StudyAssistant};
pub use config::LLMConfig;
pub use flashcard::parse_flashcard;
pub use types::*;
