use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use streamwatch_core::config::{Config, process_env, resolve_secret};

use crate::reflector::{Presence, PresenceSink};

mod types;

pub use types::User;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram caps the bot short description at 120 characters.
pub const SHORT_DESCRIPTION_LIMIT: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub base_url: Option<String>,
}

impl TelegramSettings {
    /// # Errors
    /// Returns an error if no bot token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_env(config, &process_env)
    }

    /// # Errors
    /// Returns an error if no bot token is configured.
    pub fn from_config_with_env<F>(config: &Config, env: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(bot_token) =
            resolve_secret(config.telegram.bot_token.as_deref(), "TELEGRAM_BOT_TOKEN", env)
        else {
            bail!("telegram.bot_token or TELEGRAM_BOT_TOKEN is required");
        };
        let base_url = resolve_secret(
            config.telegram.base_url.as_deref(),
            "STREAMWATCH_TELEGRAM_BASE_URL",
            env,
        );

        Ok(Self {
            bot_token,
            base_url,
        })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl TelegramClient {
    /// Builds a client on a shared HTTP session.
    pub fn from_settings(http: reqwest::Client, settings: TelegramSettings) -> Self {
        let base_url = settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            base_url,
            token: settings.bot_token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bounds every Bot API call, including reading the response.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the bot's own account; doubles as the login check.
    pub async fn get_me(&self) -> Result<User> {
        self.post("getMe", &EmptyRequest {}).await
    }

    pub async fn set_short_description(&self, short_description: &str) -> Result<()> {
        let request = SetShortDescriptionRequest { short_description };
        let _: bool = self.post("setMyShortDescription", &request).await?;
        Ok(())
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        // reqwest errors carry the URL, which embeds the token.
        let response = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| anyhow!("Telegram {method} request failed: {}", err.without_url()))?;

        let payload: TelegramResponse<T> = response.json().await.map_err(|err| {
            anyhow!(
                "Failed to decode Telegram {method} response: {}",
                err.without_url()
            )
        })?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "Telegram API error".to_string());
            bail!("{}", description);
        }

        payload
            .result
            .ok_or_else(|| anyhow!("Telegram {method} response has no result"))
    }
}

#[async_trait]
impl PresenceSink for TelegramClient {
    async fn set_presence(&self, presence: &Presence) -> Result<()> {
        self.set_short_description(&presence.render(SHORT_DESCRIPTION_LIMIT))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmptyRequest {}

#[derive(Debug, Serialize)]
struct SetShortDescriptionRequest<'a> {
    short_description: &'a str,
}
