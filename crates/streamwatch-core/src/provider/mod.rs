//! Stream status providers.
//!
//! A provider performs one HTTP request per poll and reduces the payload to a
//! liveness boolean. Every failure (transport, status, body) comes back as a
//! [`PollError`]; the poller decides what a failure means.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::config::{Config, ProviderKind, process_env, resolve_secret};

mod error;
mod lifecycle;
mod live_input;

pub use error::{PollError, PollErrorKind};
pub use lifecycle::LifecycleProvider;
pub use live_input::LiveInputProvider;

/// Outcome of one poll attempt.
pub type PollResult = std::result::Result<bool, PollError>;

/// Source of the stream's liveness signal.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Performs one poll. `Ok(true)` means the stream is broadcasting.
    async fn fetch_liveness(&self) -> PollResult;
}

/// Resolved provider settings with all required secrets present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    Lifecycle {
        api_token: String,
        customer_code: String,
        input_id: String,
        base_url: Option<String>,
    },
    LiveInput {
        api_token: String,
        account_id: String,
        input_id: String,
        base_url: Option<String>,
    },
}

impl ProviderSettings {
    /// Resolves settings from config, falling back to the process environment.
    ///
    /// # Errors
    /// Returns an error naming the first missing secret.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_env(config, &process_env)
    }

    /// Resolves settings with a custom environment lookup.
    ///
    /// # Errors
    /// Returns an error naming the first missing secret.
    pub fn from_config_with_env<F>(config: &Config, env: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = &config.provider;
        let api_token = require(
            provider.api_token.as_deref(),
            "provider.api_token",
            "CLOUDFLARE_API_TOKEN",
            env,
        )?;
        let input_id = require(
            provider.input_id.as_deref(),
            "provider.input_id",
            "INPUT_ID",
            env,
        )?;
        let base_url = resolve_secret(
            provider.base_url.as_deref(),
            "STREAMWATCH_PROVIDER_BASE_URL",
            env,
        )
        .map(|url| url.trim_end_matches('/').to_string());

        match provider.kind {
            ProviderKind::Lifecycle => Ok(Self::Lifecycle {
                api_token,
                customer_code: require(
                    provider.customer_code.as_deref(),
                    "provider.customer_code",
                    "CUSTOMER_CODE",
                    env,
                )?,
                input_id,
                base_url,
            }),
            ProviderKind::LiveInput => Ok(Self::LiveInput {
                api_token,
                account_id: require(
                    provider.account_id.as_deref(),
                    "provider.account_id",
                    "ACCOUNT_ID",
                    env,
                )?,
                input_id,
                base_url,
            }),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Lifecycle { .. } => ProviderKind::Lifecycle,
            Self::LiveInput { .. } => ProviderKind::LiveInput,
        }
    }

    pub fn input_id(&self) -> &str {
        match self {
            Self::Lifecycle { input_id, .. } | Self::LiveInput { input_id, .. } => input_id,
        }
    }

    /// Public watch page for the input, when the provider exposes one.
    pub fn watch_url(&self) -> Option<String> {
        match self {
            Self::Lifecycle {
                customer_code,
                input_id,
                ..
            } => Some(format!(
                "https://customer-{customer_code}.cloudflarestream.com/{input_id}/iframe"
            )),
            Self::LiveInput { .. } => None,
        }
    }
}

fn require<F>(configured: Option<&str>, key: &str, env_var: &str, env: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match resolve_secret(configured, env_var, env) {
        Some(value) => Ok(value),
        None => bail!("{key} or {env_var} is required"),
    }
}

/// Builds the provider for the given settings, sharing one HTTP session.
pub fn build_provider(
    settings: &ProviderSettings,
    http: reqwest::Client,
) -> Arc<dyn StatusProvider> {
    match settings {
        ProviderSettings::Lifecycle {
            api_token,
            customer_code,
            input_id,
            base_url,
        } => Arc::new(LifecycleProvider::new(
            http,
            base_url.as_deref(),
            customer_code,
            input_id,
            api_token.clone(),
        )),
        ProviderSettings::LiveInput {
            api_token,
            account_id,
            input_id,
            base_url,
        } => Arc::new(LiveInputProvider::new(
            http,
            base_url.as_deref(),
            account_id,
            input_id,
            api_token.clone(),
        )),
    }
}

/// GETs `url` with bearer auth and decodes a JSON body.
async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    token: &str,
) -> std::result::Result<T, PollError> {
    let response = http
        .get(url)
        .bearer_auth(token)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await
        .map_err(|err| PollError::transport(&err))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PollError::http_status(status.as_u16(), &body));
    }

    let body = response
        .text()
        .await
        .map_err(|err| PollError::transport(&err))?;
    serde_json::from_str(&body).map_err(|err| {
        let mut error = PollError::parse(format!("Invalid status payload: {err}"));
        error.details = Some(body);
        error
    })
}
