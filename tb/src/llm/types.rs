//! Request/response types shared by the capability providers

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LlmError;

/// A completion request - everything needed for one capability call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (rendered from a Handlebars template)
    pub system_prompt: String,

    /// Conversation turns, oldest first; the last one is the user message
    pub messages: Vec<Message>,

    /// Max tokens for the response (from config)
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Single-message request
    pub fn single(system_prompt: impl Into<String>, text: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![Message::user(text)],
            max_tokens,
        }
    }
}

/// A message in the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("Message::assistant: called");
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Text content (None when the provider returned no text part)
    pub content: Option<String>,

    pub usage: TokenUsage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Outcome of one generation attempt as seen by the conversation layer
///
/// Failures are values here: callers branch on `Unavailable` instead of
/// handling errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    Unavailable,
    RateLimited { retry_after: Option<Duration> },
}

impl From<Result<CompletionResponse, LlmError>> for Generation {
    fn from(result: Result<CompletionResponse, LlmError>) -> Self {
        match result {
            Ok(response) => match response.content.map(|t| t.trim().to_string()) {
                Some(text) if !text.is_empty() => {
                    debug!("Generation::from: text");
                    Generation::Text(text)
                }
                _ => {
                    debug!("Generation::from: empty completion");
                    Generation::Unavailable
                }
            },
            Err(e) if e.is_rate_limit() => {
                let retry_after = e.retry_after();
                debug!(?retry_after, "Generation::from: rate limited");
                Generation::RateLimited { retry_after }
            }
            Err(e) => {
                debug!(error = %e, "Generation::from: unavailable");
                Generation::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: Option<&str>) -> CompletionResponse {
        CompletionResponse {
            content: text.map(str::to_string),
            usage: TokenUsage::default(),
        }
    }

    #[test]
    fn test_generation_from_text_is_trimmed() {
        let generation = Generation::from(Ok(response(Some("  Hello \n"))));
        assert_eq!(generation, Generation::Text("Hello".to_string()));
    }

    #[test]
    fn test_empty_completion_is_unavailable() {
        assert_eq!(Generation::from(Ok(response(None))), Generation::Unavailable);
        assert_eq!(Generation::from(Ok(response(Some("   ")))), Generation::Unavailable);
    }

    #[test]
    fn test_errors_map_to_outcomes() {
        let limited = Generation::from(Err(LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(31)),
        }));
        assert_eq!(
            limited,
            Generation::RateLimited {
                retry_after: Some(Duration::from_secs(31))
            }
        );

        let failed = Generation::from(Err(LlmError::ApiError {
            status: 404,
            message: "model not found".to_string(),
        }));
        assert_eq!(failed, Generation::Unavailable);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::assistant("ok")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
