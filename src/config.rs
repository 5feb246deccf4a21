//! Environment-driven configuration
//!
//! All values have defaults suitable for local development; generation
//! parameters are validated at load time so the gateway never sees an
//! out-of-range temperature or a zero token cap.

use crate::llm::GenerationParams;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be in [0, 1], got {value}")]
    TemperatureOutOfRange { key: &'static str, value: f32 },

    #[error("{key} must be positive")]
    MustBePositive { key: &'static str },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub model_name: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Max prior messages used for model context (`H`)
    pub history_window: usize,
    pub model_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_commit_retries: u32,
    pub max_message_len: usize,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            gemini_api_key: None,
            model_name: "gemini-1.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 1000,
            history_window: 5,
            model_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(1),
            max_commit_retries: 3,
            max_message_len: 4000,
            max_sessions: 1024,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            host: env_or("HOST", defaults.host),
            port: parse_env("PORT", defaults.port)?,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.allowed_origins),
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model_name: env_or("MODEL_NAME", defaults.model_name),
            temperature: parse_env("MODEL_TEMPERATURE", defaults.temperature)?,
            max_output_tokens: parse_env("MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
            history_window: parse_env("MAX_CONVERSATION_HISTORY", defaults.history_window)?,
            model_timeout: Duration::from_secs(parse_env(
                "MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )?),
            retry_backoff: Duration::from_millis(parse_env(
                "RETRY_BACKOFF_MS",
                u64::try_from(defaults.retry_backoff.as_millis()).unwrap_or(1000),
            )?),
            max_commit_retries: parse_env("MAX_COMMIT_RETRIES", defaults.max_commit_retries)?,
            max_message_len: parse_env("MAX_MESSAGE_LEN", defaults.max_message_len)?,
            max_sessions: parse_env("MAX_SESSIONS", defaults.max_sessions)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Enforce generation-parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange {
                key: "MODEL_TEMPERATURE",
                value: self.temperature,
            });
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::MustBePositive {
                key: "MAX_OUTPUT_TOKENS",
            });
        }
        if self.history_window == 0 {
            return Err(ConfigError::MustBePositive {
                key: "MAX_CONVERSATION_HISTORY",
            });
        }
        if self.max_message_len == 0 {
            return Err(ConfigError::MustBePositive {
                key: "MAX_MESSAGE_LEN",
            });
        }
        Ok(())
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn gemini_configured(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}
