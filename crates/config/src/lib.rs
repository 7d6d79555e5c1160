//! Configuration management
//!
//! Loads settings from `~/.reddit-analyzer/config.json` and overlays the
//! `OPENAI_*` environment variables on top. A `.env` file in the working
//! directory (or a parent) feeds the environment first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_MAX_TOKENS: &str = "OPENAI_MAX_TOKENS";
pub const ENV_TEMPERATURE: &str = "OPENAI_TEMPERATURE";
pub const ENV_TIMEOUT_SECONDS: &str = "OPENAI_TIMEOUT_SECONDS";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    30
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Agent defaults applied by the CLI
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    /// Per-tool call ceilings
    #[serde(default)]
    pub tool_limits: BTreeMap<String, u32>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Config {
    /// Load from the default location, then apply the process environment
    pub async fn load() -> Result<Self> {
        load_dotenv();
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults when it is absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    /// Save to a specific file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overlay `OPENAI_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay `OPENAI_*` variables read through `lookup`.
    ///
    /// Unset or empty variables leave the current value alone.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = key;
        }
        if let Some(base) = get(ENV_API_BASE) {
            self.llm.api_base = Some(base);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(raw) = get(ENV_MAX_TOKENS) {
            self.llm.max_tokens = parse_env(ENV_MAX_TOKENS, &raw)?;
        }
        if let Some(raw) = get(ENV_TEMPERATURE) {
            self.llm.temperature = parse_env(ENV_TEMPERATURE, &raw)?;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECONDS) {
            self.llm.timeout_secs = parse_env(ENV_TIMEOUT_SECONDS, &raw)?;
        }
        Ok(())
    }
}

/// Read `.env` into the process environment. Variables already set win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

/// Write the default config file unless one already exists, then load it
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("Config already exists at {:?}", config_path);
    } else {
        Config::default().save().await?;
        info!("Config created at {:?}", config_path);
    }

    Config::load().await
}
