//! Sei configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Sei configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model endpoint
    pub llm: LlmConfig,

    /// Task store location and round-trip limits
    pub store: StoreConfig,

    /// Chat session settings
    pub session: SessionConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider != "ollama" {
            return Err(eyre::eyre!(
                "Unsupported LLM provider '{}'. Supported: ollama",
                self.llm.provider
            ));
        }
        if self.llm.timeout_ms == 0 {
            return Err(eyre::eyre!("llm.timeout-ms must be greater than zero"));
        }
        if self.store.timeout_ms == 0 {
            return Err(eyre::eyre!("store.timeout-ms must be greater than zero"));
        }
        if self.store.subtask_concurrency == 0 {
            return Err(eyre::eyre!("store.subtask-concurrency must be at least 1"));
        }
        if self.session.user_id.trim().is_empty() {
            return Err(eyre::eyre!("session.user-id must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .sei.yml
        let local_config = PathBuf::from(".sei.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/sei/sei.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sei").join("sei.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "ollama" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Server base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Chat endpoint path appended to the base URL
    #[serde(rename = "chat-path")]
    pub chat_path: String,

    /// Environment variable holding an optional bearer token
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_path: "/api/chat".to_string(),
            api_key_env: "SEI_API_KEY".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Full chat endpoint URL
    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }

    /// Bearer token, if the configured environment variable is set
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Task store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the SQLite database
    pub path: PathBuf,

    /// Timeout for each store round-trip in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Maximum subtask inserts in flight at once
    #[serde(rename = "subtask-concurrency")]
    pub subtask_concurrency: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/sei on Linux)
        let path = dirs::data_local_dir()
            .map(|d| d.join("sei"))
            .unwrap_or_else(|| PathBuf::from(".sei"));

        Self {
            path,
            timeout_ms: 10_000,
            subtask_concurrency: 4,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Owner of every task this session commits
    #[serde(rename = "user-id")]
    pub user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
        }
    }
}
