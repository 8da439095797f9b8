//! Configuration management for streamwatch.
//!
//! Loads configuration from ${STREAMWATCH_HOME}/config.toml with sensible defaults.
//! Secrets missing from the file are filled in from the environment when the
//! runtime settings are resolved (see `provider::ProviderSettings`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which Cloudflare Stream endpoint is polled for liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Per-customer lifecycle endpoint (`{"live": bool}`).
    #[default]
    Lifecycle,
    /// Account-level live input API (`result.status`).
    LiveInput,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Lifecycle => "lifecycle",
            ProviderKind::LiveInput => "live_input",
        }
    }
}

/// Status provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Cloudflare API token (bearer).
    pub api_token: Option<String>,
    /// Customer subdomain code, used by the lifecycle endpoint.
    pub customer_code: Option<String>,
    /// Account ID, used by the live input endpoint.
    pub account_id: Option<String>,
    /// Live input identifier.
    pub input_id: Option<String>,
    /// Replaces the scheme and host of the endpoint.
    pub base_url: Option<String>,
}

/// Presence text shown by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Link attached to the live and offline presence.
    pub stream_url: Option<String>,
    pub live_label: String,
    pub offline_label: String,
    pub error_label: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stream_url: None,
            live_label: "🔴 LIVE".to_string(),
            offline_label: "⚫ DOWN".to_string(),
            error_label: "❗ Error detected. Check logs.".to_string(),
        }
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token for Telegram API.
    pub bot_token: Option<String>,
    /// Overrides `https://api.telegram.org`.
    pub base_url: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between polls
    pub poll_interval_secs: u64,

    /// Consecutive non-live polls before announcing offline
    pub disconnect_threshold: u32,

    /// Seconds of continuous failure before escalating
    pub error_threshold_secs: u64,

    /// Per-poll timeout in seconds
    pub poll_timeout_secs: u64,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            disconnect_threshold: Self::DEFAULT_DISCONNECT_THRESHOLD,
            error_threshold_secs: Self::DEFAULT_ERROR_THRESHOLD_SECS,
            poll_timeout_secs: Self::DEFAULT_POLL_TIMEOUT_SECS,
            provider: ProviderConfig::default(),
            presence: PresenceConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
    const DEFAULT_DISCONNECT_THRESHOLD: u32 = 3;
    /// 30 minutes
    const DEFAULT_ERROR_THRESHOLD_SECS: u64 = 30 * 60;
    const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

pub mod paths {
    //! Path resolution for streamwatch configuration.
    //!
    //! `STREAMWATCH_HOME` resolution order:
    //! 1. `STREAMWATCH_HOME` environment variable (if set)
    //! 2. ~/.config/streamwatch (default)

    use std::path::PathBuf;

    /// Returns the streamwatch home directory.
    pub fn streamwatch_home() -> PathBuf {
        if let Ok(home) = std::env::var("STREAMWATCH_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("streamwatch")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        streamwatch_home().join("config.toml")
    }
}

/// Reads a secret from config, falling back to an environment lookup.
///
/// Values are trimmed; empty strings count as missing.
pub fn resolve_secret<F>(configured: Option<&str>, env_var: &str, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env(env_var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

/// Environment lookup backed by the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
