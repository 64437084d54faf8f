//! Generation capability for TrustBridge
//!
//! Provider clients, the shared request/response types, and the
//! [`Generator`] that gates every call through the dispatcher.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod gemini;
mod generator;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use gemini::{GeminiClient, parse_retry_hint};
pub use generator::{GenerationContext, Generator};
pub use types::{CompletionRequest, CompletionResponse, Generation, Message, Role, TokenUsage};

use crate::config::LlmConfig;

/// Create a client for the provider named in config
///
/// Supports "gemini" and "anthropic". Fails when the provider is unknown
/// or its API key is not set.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "gemini" => {
            debug!("create_client: creating Gemini client");
            Ok(Arc::new(GeminiClient::from_config(config)?))
        }
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: gemini, anthropic",
                other
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = LlmConfig {
            api_key_env: "TRUSTBRIDGE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::Config(_))));
    }
}
