//! External LLM provider calls.
//!
//! Every provider is driven in streaming mode over SSE. OpenAI and Groq share
//! the chat-completions wire format; Anthropic uses the Messages API. Callers
//! that need the whole answer use [`complete`], which drains the stream.

use std::pin::Pin;

use futures::Stream;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use neuronote_core::{Error, Result};

use crate::config::ResolvedProvider;
use crate::types::{LLMProvider, PromptMessage};

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token, the end marker, or a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    OpenAICompat,
    Anthropic,
}

fn endpoint(provider: LLMProvider) -> (&'static str, WireFormat) {
    match provider {
        LLMProvider::OpenAI => (
            "https://api.openai.com/v1/chat/completions",
            WireFormat::OpenAICompat,
        ),
        LLMProvider::Groq => (
            "https://api.groq.com/openai/v1/chat/completions",
            WireFormat::OpenAICompat,
        ),
        LLMProvider::Anthropic => ("https://api.anthropic.com/v1/messages", WireFormat::Anthropic),
    }
}

/// JSON request body. Anthropic takes the system prompt as a top-level field.
fn request_body(
    format: WireFormat,
    model: &str,
    messages: &[PromptMessage],
    temperature: f64,
    max_tokens: usize,
) -> Value {
    match format {
        WireFormat::OpenAICompat => json!({
            "model": model,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect::<Vec<_>>(),
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": true,
        }),
        WireFormat::Anthropic => {
            let system: Vec<&str> = messages
                .iter()
                .filter(|m| m.role == "system")
                .map(|m| m.content.as_str())
                .collect();
            let mut body = json!({
                "model": model,
                "messages": messages
                    .iter()
                    .filter(|m| m.role != "system")
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect::<Vec<_>>(),
                "temperature": temperature,
                "max_tokens": max_tokens,
                "stream": true,
            });
            if !system.is_empty() {
                body["system"] = json!(system.join("\n\n"));
            }
            body
        }
    }
}

/// What one SSE `data:` payload means.
#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Token(String),
    Done,
    Error(String),
    Skip,
}

fn parse_data(format: WireFormat, data: &str) -> SseEvent {
    let data = data.trim();
    if format == WireFormat::OpenAICompat && data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(parsed) = serde_json::from_str::<Value>(data) else {
        return SseEvent::Skip;
    };
    match format {
        WireFormat::OpenAICompat => match parsed["choices"][0]["delta"]["content"].as_str() {
            Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
            _ => match parsed["error"]["message"].as_str() {
                Some(msg) => SseEvent::Error(msg.to_string()),
                None => SseEvent::Skip,
            },
        },
        WireFormat::Anthropic => match parsed["type"].as_str() {
            Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
                Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
                _ => SseEvent::Skip,
            },
            Some("message_stop") => SseEvent::Done,
            Some("error") => SseEvent::Error(
                parsed["error"]["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            _ => SseEvent::Skip,
        },
    }
}

/// Splits a byte stream into complete lines.
#[derive(Default)]
struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.push_str(&String::from_utf8_lossy(bytes));
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.pending.find('\n')?;
        let line = self.pending[..end].trim().to_string();
        self.pending.drain(..=end);
        Some(line)
    }
}

/// Stream tokens from the resolved provider.
pub fn stream_llm(
    client: &Client,
    resolved: &ResolvedProvider,
    messages: &[PromptMessage],
    temperature: f64,
    max_tokens: usize,
) -> BoxedStream {
    let (url, format) = endpoint(resolved.provider);
    let body = request_body(format, &resolved.model, messages, temperature, max_tokens);
    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&body);
    request = match format {
        WireFormat::OpenAICompat => {
            request.header("Authorization", format!("Bearer {}", resolved.api_key))
        }
        WireFormat::Anthropic => request
            .header("x-api-key", resolved.api_key.as_str())
            .header("anthropic-version", "2023-06-01"),
    };
    debug!("Streaming from {} with model {}", resolved.provider, resolved.model);

    Box::pin(async_stream::stream! {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut token_count = 0usize;

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(b) => lines.push(&b),
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            }

            while let Some(line) = lines.next_line() {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match parse_data(format, data) {
                    SseEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    SseEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseEvent::Error(msg) => {
                        error!("Provider error: {}", msg);
                        yield StreamChunk::Error(msg);
                        return;
                    }
                    SseEvent::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    })
}

/// Drain a token stream into one string.
pub async fn collect_stream(mut stream: BoxedStream) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(t) => text.push_str(&t),
            StreamChunk::Done { tokens_used } => {
                debug!("Completion finished after {} tokens", tokens_used);
                break;
            }
            StreamChunk::Error(e) => return Err(Error::GenerationFailed(e)),
        }
    }
    if text.trim().is_empty() {
        return Err(Error::GenerationFailed("Model returned an empty response".into()));
    }
    Ok(text)
}

/// Non-streaming completion.
pub async fn complete(
    client: &Client,
    resolved: &ResolvedProvider,
    messages: &[PromptMessage],
    temperature: f64,
    max_tokens: usize,
) -> Result<String> {
    collect_stream(stream_llm(client, resolved, messages, temperature, max_tokens)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_events() {
        let f = WireFormat::OpenAICompat;
        assert_eq!(
            parse_data(f, r#"{"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseEvent::Token("Hi".into())
        );
        assert_eq!(parse_data(f, " [DONE]"), SseEvent::Done);
        assert_eq!(parse_data(f, r#"{"choices":[{"delta":{}}]}"#), SseEvent::Skip);
        assert_eq!(parse_data(f, "garbage"), SseEvent::Skip);
    }

    #[test]
    fn test_anthropic_events() {
        let f = WireFormat::Anthropic;
        assert_eq!(
            parse_data(f, r#"{"type":"content_block_delta","delta":{"text":"Yo"}}"#),
            SseEvent::Token("Yo".into())
        );
        assert_eq!(parse_data(f, r#"{"type":"message_stop"}"#), SseEvent::Done);
        assert_eq!(
            parse_data(f, r#"{"type":"error","error":{"message":"overloaded"}}"#),
            SseEvent::Error("overloaded".into())
        );
        assert_eq!(parse_data(f, r#"{"type":"ping"}"#), SseEvent::Skip);
    }

    #[test]
    fn test_line_buffer_handles_split_chunks() {
        let mut lines = LineBuffer::default();
        lines.push(b"data: {\"a\"");
        assert_eq!(lines.next_line(), None);
        lines.push(b":1}\n\ndata: [DONE]\n");
        assert_eq!(lines.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(lines.next_line().as_deref(), Some(""));
        assert_eq!(lines.next_line().as_deref(), Some("data: [DONE]"));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_anthropic_body_moves_system_prompt() {
        let messages = vec![
            PromptMessage::system("Be brief."),
            PromptMessage::user("Hello"),
        ];
        let body = request_body(WireFormat::Anthropic, "claude", &messages, 0.2, 100);
        assert_eq!(body["system"], "Be brief.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");

        let body = request_body(WireFormat::OpenAICompat, "gpt", &messages, 0.2, 100);
        assert!(body.get("system").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let ok: BoxedStream = Box::pin(futures::stream::iter(vec![
            StreamChunk::Token("Hello".into()),
            StreamChunk::Token(", world".into()),
            StreamChunk::Done { tokens_used: 2 },
        ]));
        assert_eq!(collect_stream(ok).await.unwrap(), "Hello, world");

        let failed: BoxedStream = Box::pin(futures::stream::iter(vec![
            StreamChunk::Token("partial".into()),
            StreamChunk::Error("boom".into()),
        ]));
        assert!(matches!(
            collect_stream(failed).await,
            Err(Error::GenerationFailed(msg)) if msg == "boom"
        ));

        let empty: BoxedStream =
            Box::pin(futures::stream::iter(vec![StreamChunk::Done { tokens_used: 0 }]));
        assert!(collect_stream(empty).await.is_err());
    }
}
