//! Google Gemini API client implementation
//!
//! Implements the LlmClient trait against the Generative Language
//! `generateContent` endpoint. Rate-limit responses carry their retry hint
//! in one of several places; [`parse_retry_hint`] checks them in order.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Role, TokenUsage};
use crate::config::LlmConfig;

static RETRY_SECONDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry.*?(\d+)(?:\.\d+)?\s*s").expect("valid retry seconds regex"));

const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";

/// Longest retry delay a server hint may ask for
pub const MAX_RETRY_HINT: Duration = Duration::from_secs(3600);

/// Google Gemini API client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "GeminiClient::from_config: called");
        let api_key = config.api_key().map_err(|e| LlmError::Config(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/v1beta/{}:generateContent", self.base_url, model)
    }

    /// Build the request body for the Gemini API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "GeminiClient::build_request_body: called");
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": msg.content }],
                })
            })
            .collect();

        serde_json::json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": contents,
            "generationConfig": { "maxOutputTokens": request.max_tokens.min(self.max_tokens) },
        })
    }

    /// Parse the Gemini API response
    fn parse_response(&self, api_response: GeminiResponse) -> CompletionResponse {
        debug!(candidates = api_response.candidates.len(), "GeminiClient::parse_response: called");
        let content = api_response.candidates.into_iter().next().and_then(|candidate| {
            let text: String = candidate
                .content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("");
            if text.is_empty() { None } else { Some(text) }
        });

        let usage = api_response
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        CompletionResponse { content, usage }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "GeminiClient::complete: called");
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.clone())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("GeminiClient::complete: rate limited (429)");
            let header = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            let retry_after = parse_retry_hint(header.as_deref(), &text);
            debug!(?retry_after, "GeminiClient::complete: parsed retry hint");
            return Err(LlmError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            debug!(%status, "GeminiClient::complete: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status,
                message: error_message(&text),
            });
        }

        debug!("GeminiClient::complete: success");
        let api_response: GeminiResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

/// Extract a retry delay from a rate-limit response
///
/// Order: `retry-after` header (whole seconds), a `google.rpc.RetryInfo`
/// `retryDelay` in the error details ("31s"), then a `retry ... N s`
/// phrase in the error message. Hints are capped at [`MAX_RETRY_HINT`].
pub fn parse_retry_hint(header: Option<&str>, body: &str) -> Option<Duration> {
    debug!(?header, body_len = body.len(), "parse_retry_hint: called");
    find_retry_hint(header, body).map(|delay| delay.min(MAX_RETRY_HINT))
}

fn find_retry_hint(header: Option<&str>, body: &str) -> Option<Duration> {
    if let Some(secs) = header.and_then(|h| h.trim().parse::<u64>().ok()) {
        debug!(%secs, "find_retry_hint: from header");
        return Some(Duration::from_secs(secs));
    }

    let parsed: Option<GeminiErrorEnvelope> = serde_json::from_str(body).ok();
    if let Some(envelope) = &parsed {
        let delay = envelope
            .error
            .details
            .iter()
            .filter(|d| d.type_url.as_deref() == Some(RETRY_INFO_TYPE))
            .find_map(|d| d.retry_delay.as_deref())
            .and_then(parse_delay_string);
        if delay.is_some() {
            debug!(?delay, "find_retry_hint: from RetryInfo");
            return delay;
        }
    }

    let message = parsed.map(|e| e.error.message).unwrap_or_else(|| body.to_string());
    let delay = RETRY_SECONDS_RE
        .captures(&message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs);
    debug!(?delay, "find_retry_hint: from message");
    delay
}

/// Parse a protobuf duration string such as "31s" or "1.5s"
fn parse_delay_string(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().trim_end_matches('s').parse().ok()?;
    if secs.is_nan() {
        return None;
    }
    Duration::try_from_secs_f64(secs.min(MAX_RETRY_HINT.as_secs_f64())).ok()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiErrorDetail {
    #[serde(rename = "@type")]
    type_url: Option<String>,
    retry_delay: Option<String>,
}
