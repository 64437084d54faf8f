//! Language detection
//!
//! Best-effort: the remote detector is optional and any failure falls back
//! to a Swahili function-word heuristic. Detection never fails a turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LanguageConfig;

const SWAHILI_MARKERS: &[&str] = &["na", "ya", "wa", "za", "ni", "kwa", "hii", "hilo", "hili", "haya", "hayo"];

/// Errors from the remote detection capability
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {0}")]
    Api(u16),

    #[error("No detection in response")]
    Empty,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Remote language detection capability
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Detect the language tag ("en", "sw", ...) of `text`
    async fn detect(&self, text: &str) -> Result<String, DetectError>;
}

/// Google Cloud Translation v2 `detect` endpoint
pub struct GoogleDetector {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GoogleDetector {
    pub fn from_config(config: &LanguageConfig) -> Result<Self, DetectError> {
        debug!(base_url = %config.base_url, "GoogleDetector::from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DetectError::Config(format!("{} is not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl LanguageDetector for GoogleDetector {
    async fn detect(&self, text: &str) -> Result<String, DetectError> {
        debug!(text_len = text.len(), "GoogleDetector::detect: called");
        let url = format!("{}/language/translate/v2/detect", self.base_url);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "q": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "GoogleDetector::detect: API error");
            return Err(DetectError::Api(status.as_u16()));
        }

        let body: DetectResponse = response.json().await?;
        body.data
            .detections
            .into_iter()
            .next()
            .and_then(|d| d.into_iter().next())
            .map(|d| d.language)
            .ok_or(DetectError::Empty)
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    #[serde(default)]
    detections: Vec<Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
}

/// Build the configured detector, if any
pub fn create_detector(config: &LanguageConfig) -> Option<Arc<dyn LanguageDetector>> {
    if !config.detect_enabled {
        debug!("create_detector: detection disabled");
        return None;
    }
    match GoogleDetector::from_config(config) {
        Ok(detector) => Some(Arc::new(detector)),
        Err(e) => {
            debug!(error = %e, "create_detector: using heuristic only");
            None
        }
    }
}

/// More than 10% of the words are common Swahili function words
pub fn is_swahili(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }
    let hits = words.iter().filter(|w| SWAHILI_MARKERS.contains(w)).count();
    hits as f64 > words.len() as f64 * 0.1
}

/// Heuristic tag for `text`
pub fn heuristic_language(text: &str) -> &'static str {
    if is_swahili(text) { "sw" } else { "en" }
}

/// Detect with the remote capability, falling back to the heuristic
pub async fn detect_language(detector: Option<&dyn LanguageDetector>, text: &str) -> String {
    debug!(text_len = text.len(), has_detector = detector.is_some(), "detect_language: called");
    if let Some(detector) = detector {
        match detector.detect(text).await {
            Ok(tag) if !tag.is_empty() && tag != "und" => return tag,
            Ok(tag) => debug!(%tag, "detect_language: inconclusive, using heuristic"),
            Err(e) => warn!(error = %e, "Language detection failed, using heuristic"),
        }
    }
    heuristic_language(text).to_string()
}
