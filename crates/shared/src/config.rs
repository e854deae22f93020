//! Configuration management for the CineChunks services.
//!
//! Settings are read from a TOML file (with sensible defaults for every
//! field) and then overlaid with environment keys, so a deployment can keep
//! secrets out of the file entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OpenSubtitles gateway settings
    #[serde(default)]
    pub subtitles: SubtitlesConfig,

    /// Tool server bind settings
    #[serde(default)]
    pub tool_server: ToolServerConfig,

    /// Chat-completion planner settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Web front end bind settings
    #[serde(default)]
    pub web: WebConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory path
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// OpenSubtitles REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitlesConfig {
    /// API base URL
    pub base_url: String,

    /// Consumer API key (required for any upstream call)
    pub api_key: Option<String>,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Pre-issued bearer token; skips the login exchange entirely
    pub token: Option<String>,

    /// Account credentials exchanged once for a bearer token
    pub username: Option<String>,
    pub password: Option<String>,

    /// ISO 639-1 language used when a caller does not pick one
    pub language: String,

    /// Timeout for API calls in seconds
    pub timeout_secs: u64,

    /// Timeout for the subtitle file download in seconds
    pub download_timeout_secs: u64,

    /// Maximum retries for transient failures
    pub max_retries: u32,

    /// Retry delay in milliseconds (doubled on every attempt)
    pub retry_delay_ms: u64,
}

/// Tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the Streamable HTTP endpoint is mounted on
    pub path: String,
}

/// Episode planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Chat-completion API key (required for plan generation)
    pub api_key: Option<String>,

    /// Chat-completion model identifier
    pub model: String,

    /// Chat-completion API base URL
    pub base_url: String,

    /// Tool server endpoint
    pub tool_server_url: String,

    /// Maximum model rounds before giving up
    pub max_rounds: usize,

    /// Timeout for a single chat-completion call in seconds
    pub timeout_secs: u64,

    /// Timeout for a single tool invocation in seconds
    pub tool_timeout_secs: u64,
}

/// Web front end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: false,
            json_format: false,
        }
    }
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.opensubtitles.com/api/v1".to_string(),
            api_key: None,
            user_agent: "CineChunksMCP/1.0".to_string(),
            token: None,
            username: None,
            password: None,
            language: "en".to_string(),
            timeout_secs: 30,
            download_timeout_secs: 60,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/mcp".to_string(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            tool_server_url: "http://127.0.0.1:8000/mcp".to_string(),
            max_rounds: 5,
            timeout_secs: 30,
            tool_timeout_secs: 120,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load the TOML file, then overlay `.env` and process environment keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;

        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "Loaded .env file");
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay environment-style keys onto this configuration.
    ///
    /// Blank values are ignored and unparsable ports keep their current value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(v) = get("OPENAI_API_KEY") {
            self.planner.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.planner.model = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.planner.base_url = v;
        }
        if let Some(v) = get("MCP_URL") {
            self.planner.tool_server_url = v;
        }

        if let Some(v) = get("OPEN_SUBTITLES_API_KEY") {
            self.subtitles.api_key = Some(v);
        }
        if let Some(v) = get("OPEN_SUBTITLES_USER_AGENT") {
            self.subtitles.user_agent = v;
        }
        if let Some(v) = get("OPEN_SUBTITLES_TOKEN") {
            self.subtitles.token = Some(v);
        }
        if let Some(v) = get("OPEN_SUBTITLES_USERNAME") {
            self.subtitles.username = Some(v);
        }
        if let Some(v) = get("OPEN_SUBTITLES_PASSWORD") {
            self.subtitles.password = Some(v);
        }

        if let Some(v) = get("MCP_HTTP_HOST") {
            self.tool_server.host = v;
        }
        if let Some(v) = get("MCP_HTTP_PORT") {
            match v.parse() {
                Ok(port) => self.tool_server.port = port,
                Err(_) => tracing::warn!(value = %v, "Ignoring invalid MCP_HTTP_PORT"),
            }
        }
        if let Some(v) = get("MCP_HTTP_PATH") {
            self.tool_server.path = v;
        }

        if let Some(v) = get("WEB_HTTP_HOST") {
            self.web.host = v;
        }
        if let Some(v) = get("WEB_HTTP_PORT") {
            match v.parse() {
                Ok(port) => self.web.port = port,
                Err(_) => tracing::warn!(value = %v, "Ignoring invalid WEB_HTTP_PORT"),
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the log directory path
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.log_dir)
    }

    /// Parse the configured default log level, falling back to INFO.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .default_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
