use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use streamwatch_core::config::{Config, process_env};
use streamwatch_core::poller::{PollerSettings, StatusPoller};
use streamwatch_core::provider::{ProviderSettings, build_provider};
use tokio_util::sync::CancellationToken;

use crate::reflector::{PresenceReflector, PresenceSettings};
use crate::telegram::{TelegramClient, TelegramSettings};

pub mod reflector;
pub mod telegram;

/// Everything the bot needs, resolved and validated before any network work.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub provider: ProviderSettings,
    pub telegram: TelegramSettings,
    pub presence: PresenceSettings,
    pub poller: PollerSettings,
}

impl BotSettings {
    /// # Errors
    /// Returns an error naming the first missing secret.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_env(config, &process_env)
    }

    /// # Errors
    /// Returns an error naming the first missing secret.
    pub fn from_config_with_env<F>(config: &Config, env: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = ProviderSettings::from_config_with_env(config, env)?;
        let telegram = TelegramSettings::from_config_with_env(config, env)?;
        let presence = PresenceSettings::resolve(&config.presence, &provider);
        Ok(Self {
            provider,
            telegram,
            presence,
            poller: PollerSettings::from_config(config),
        })
    }
}

/// Runs the bot until Ctrl+C.
pub async fn run(config: Config) -> Result<()> {
    let settings = BotSettings::from_config(&config)?;
    tracing::info!(
        provider = settings.provider.kind().display_name(),
        input_id = settings.provider.input_id(),
        stream_url = settings.presence.stream_url.as_deref().unwrap_or("-"),
        "Starting streamwatch bot."
    );
    run_bot(settings, ctrl_c()).await
}

/// Logs in, then polls and reflects until `shutdown` resolves.
///
/// # Errors
/// Returns an error if the Telegram login fails or the poller task dies.
pub async fn run_bot<F>(settings: BotSettings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let http = reqwest::Client::new();
    let client = TelegramClient::from_settings(http.clone(), settings.telegram);

    let me = client
        .get_me()
        .await
        .context("Failed to log in to Telegram")?;
    tracing::info!("Logged in as {} (ID: {})", me.display_name(), me.id);

    let provider = build_provider(&settings.provider, http);
    let reflector = Arc::new(PresenceReflector::new(client, settings.presence));
    let poller = StatusPoller::new(provider, reflector, settings.poller);

    let cancel = CancellationToken::new();
    let mut task = tokio::spawn(poller.run(cancel.clone()));
    tokio::pin!(shutdown);

    tokio::select! {
        () = &mut shutdown => {
            tracing::info!("Shutdown requested. Stopping the bot intentionally.");
            cancel.cancel();
        }
        joined = &mut task => {
            joined.context("Status poller task failed")?;
            bail!("Status poller exited unexpectedly");
        }
    }

    let state = task.await.context("Status poller task failed")?;
    tracing::info!(last_state = ?state.current(), "Bot stopped.");
    Ok(())
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {err}");
        std::future::pending::<()>().await;
    }
}
