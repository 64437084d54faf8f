//! TrustBridge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main TrustBridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation capability configuration
    pub llm: LlmConfig,

    /// Admission control for generation calls
    pub dispatcher: DispatcherConfig,

    /// Conversation thresholds and behavior
    pub conversation: ConversationConfig,

    /// Optional language detection capability
    pub language: LanguageConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .trustbridge.yml
        let local_config = PathBuf::from(".trustbridge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/trustbridge/trustbridge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("trustbridge").join("trustbridge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    ///
    /// Load errors are swallowed here; the full load reports them.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generation capability provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("gemini" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "models/gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: 512,
            timeout_ms: 30_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }
}

/// Admission control settings for the generation capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Requests allowed per rolling window
    #[serde(rename = "max-requests-per-window")]
    pub max_requests_per_window: u32,

    /// Window length in seconds
    #[serde(rename = "rate-window-secs")]
    pub rate_window_secs: u64,

    /// Added to the even-spacing interval between releases
    #[serde(rename = "spacing-margin-ms")]
    pub spacing_margin_ms: u64,

    /// Pause after each release before serving the next waiter
    #[serde(rename = "release-pause-ms")]
    pub release_pause_ms: u64,

    /// Retries after a rate-limit signal before giving up
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Floor for computed backoff when no hint is supplied
    #[serde(rename = "min-backoff-secs")]
    pub min_backoff_secs: u64,

    /// Ceiling for any backoff, server hints included
    #[serde(rename = "max-backoff-secs")]
    pub max_backoff_secs: u64,

    /// Per-attempt timeout around the capability call
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: 12,
            rate_window_secs: 60,
            spacing_margin_ms: 500,
            release_pause_ms: 100,
            max_retries: 2,
            min_backoff_secs: 30,
            max_backoff_secs: 120,
            request_timeout_ms: 30_000,
        }
    }
}

impl DispatcherConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    /// Minimum gap between consecutive releases: ceil(window / N) + margin
    pub fn min_spacing(&self) -> Duration {
        let n = u64::from(self.max_requests_per_window.max(1));
        let window_ms = self.rate_window_secs * 1000;
        Duration::from_millis(window_ms.div_ceil(n) + self.spacing_margin_ms)
    }

    pub fn release_pause(&self) -> Duration {
        Duration::from_millis(self.release_pause_ms)
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_secs(self.min_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Conversation thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Shortest accepted description
    #[serde(rename = "min-description-len")]
    pub min_description_len: usize,

    /// Shortest accepted (accumulated) location
    #[serde(rename = "min-location-len")]
    pub min_location_len: usize,

    /// Free text longer than this in SUBCATEGORY is taken as the description
    #[serde(rename = "min-free-text-len")]
    pub min_free_text_len: usize,

    /// Conversation history entries kept in the session
    #[serde(rename = "history-limit")]
    pub history_limit: usize,

    /// Clarifying questions asked before falling back to the category menu
    #[serde(rename = "max-clarifications")]
    pub max_clarifications: usize,

    /// Let the capability phrase greetings and prompts
    #[serde(rename = "generative-replies")]
    pub generative_replies: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_description_len: 10,
            min_location_len: 5,
            min_free_text_len: 10,
            history_limit: 10,
            max_clarifications: 2,
            generative_replies: false,
        }
    }
}

/// Language detection capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    #[serde(rename = "detect-enabled")]
    pub detect_enabled: bool,

    /// Environment variable containing the translation API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            detect_enabled: true,
            api_key_env: "GOOGLE_TRANSLATE_API_KEY".to_string(),
            base_url: "https://translation.googleapis.com".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: String,

    /// Directory where uploaded evidence is copied
    #[serde(rename = "media-dir")]
    pub media_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/trustbridge on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("trustbridge"))
            .unwrap_or_else(|| PathBuf::from(".trustbridge"));

        Self {
            db_path: data_dir.join("trustbridge.db").to_string_lossy().into_owned(),
            media_dir: data_dir.join("media").to_string_lossy().into_owned(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    pub fn media_dir(&self) -> PathBuf {
        expand_home(&self.media_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
