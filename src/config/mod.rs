//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`ALLMS_*`)
//! - CLI arguments (for the `allms` binary)

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Game rules and pacing
    #[serde(default)]
    pub game: GameConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Save/load configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| GameError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GameError::Config(format!("Failed to parse config: {e}")))?;
        config.game.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // LLM settings
        if let Ok(endpoint) = std::env::var("ALLMS_LLM_ENDPOINT") {
            config.llm.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("ALLMS_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(secs) = std::env::var("ALLMS_LLM_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.llm.timeout_secs = secs;
            }
        }

        // Game settings
        if let Ok(val) = std::env::var("ALLMS_MAX_LOOKBACK") {
            if let Ok(val) = val.parse() {
                config.game.max_lookback_messages = val;
            }
        }
        if let Ok(val) = std::env::var("ALLMS_VOTE_DURATION_MIN") {
            if let Ok(val) = val.parse() {
                config.game.max_vote_duration_min = val;
            }
        }

        if let Ok(dir) = std::env::var("ALLMS_SAVE_DIR") {
            config.storage.save_directory = PathBuf::from(dir);
        }

        config
    }

    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let default_llm = LlmConfig::default();
        Self {
            llm: LlmConfig {
                endpoint: if other.llm.endpoint != default_llm.endpoint {
                    other.llm.endpoint
                } else {
                    self.llm.endpoint
                },
                model: if other.llm.model != default_llm.model {
                    other.llm.model
                } else {
                    self.llm.model
                },
                timeout_secs: if other.llm.timeout_secs != default_llm.timeout_secs {
                    other.llm.timeout_secs
                } else {
                    self.llm.timeout_secs
                },
                ..other.llm
            },
            game: other.game,
            storage: if other.storage.save_directory != StorageConfig::default().save_directory {
                other.storage
            } else {
                self.storage
            },
        }
    }
}

/// Game rules and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Rolling context window per agent (public messages, DMs and notifications)
    pub max_lookback_messages: usize,

    /// Maximum duration of an open vote, in minutes
    pub max_vote_duration_min: u64,

    /// Minimum number of agents in a chatroom
    pub min_agent_count: usize,

    /// Maximum attempts for a schema-conforming LLM reply
    pub max_model_retries: u32,

    /// Backoff between retry attempts, in milliseconds
    pub retry_backoff_ms: u64,

    /// Consecutive turns an agent may skip when nothing new arrived
    pub max_turn_skips: u32,

    /// Lower bound of the per-turn delay, in seconds
    pub min_turn_delay_secs: u64,

    /// Upper bound of the per-turn delay, in seconds
    pub max_turn_delay_secs: u64,

    /// Number of recent senders tracked to detect a silent human
    pub silence_window: usize,

    /// Suspicion confidence at which agents are nudged to start a vote
    pub vote_nudge_confidence: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_lookback_messages: 30,
            max_vote_duration_min: 10,
            min_agent_count: 3,
            max_model_retries: 3,
            retry_backoff_ms: 500,
            max_turn_skips: 5,
            min_turn_delay_secs: 3,
            max_turn_delay_secs: 5,
            silence_window: 10,
            vote_nudge_confidence: 80,
        }
    }
}

impl GameConfig {
    /// Check the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_lookback_messages == 0 {
            return Err(GameError::Config(
                "max_lookback_messages must be > 0".to_string(),
            ));
        }
        if self.min_turn_delay_secs > self.max_turn_delay_secs {
            return Err(GameError::Config(format!(
                "min_turn_delay_secs ({}) > max_turn_delay_secs ({})",
                self.min_turn_delay_secs, self.max_turn_delay_secs
            )));
        }
        if self.max_model_retries == 0 {
            return Err(GameError::Config("max_model_retries must be > 0".to_string()));
        }
        if self.silence_window == 0 {
            return Err(GameError::Config("silence_window must be > 0".to_string()));
        }
        Ok(())
    }

    /// Vote duration as milliseconds
    pub fn vote_duration_ms(&self) -> i64 {
        (self.max_vote_duration_min * 60 * 1000) as i64
    }

    /// Range of the per-turn delay in seconds
    pub fn turn_delay_range(&self) -> RangeInclusive<u64> {
        self.min_turn_delay_secs..=self.max_turn_delay_secs
    }

    /// Backoff between LLM retries
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,

    /// Model name sent with each request
    pub model: String,

    /// Environment variable holding the API key (unset for local models)
    pub api_key_env: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Reasoning effort hint for models that accept one (low, medium, high)
    pub reasoning_effort: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "gpt-oss:20b".to_string(),
            api_key_env: None,
            timeout_secs: 120,
            temperature: Some(0.8),
            reasoning_effort: Some("low".to_string()),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }
}

/// Save/load configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory where chatrooms are saved
    pub save_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_directory: dirs::data_dir()
                .map(|p| p.join("allms").join("saves"))
                .unwrap_or_else(|| PathBuf::from("saves")),
        }
    }
}
