//! Mirrors stream transitions onto the bot's presence.

use anyhow::Result;
use async_trait::async_trait;
use streamwatch_core::config::PresenceConfig;
use streamwatch_core::poller::TransitionHandler;
use streamwatch_core::provider::{PollError, ProviderSettings};

/// Status text shown on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub label: String,
    pub url: Option<String>,
}

impl Presence {
    /// Renders `"{label} - {url}"` (or just the label), capped at `max_chars`.
    pub fn render(&self, max_chars: usize) -> String {
        let text = match self.url.as_deref() {
            Some(url) => format!("{} - {url}", self.label),
            None => self.label.clone(),
        };
        truncate_chars(&text, max_chars)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut truncated: String = text.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}

/// Chat-platform session that can display a presence.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    async fn set_presence(&self, presence: &Presence) -> Result<()>;
}

/// Labels and link resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSettings {
    pub stream_url: Option<String>,
    pub live_label: String,
    pub offline_label: String,
    pub error_label: String,
}

impl PresenceSettings {
    /// Falls back to the provider's watch page when no stream URL is configured.
    pub fn resolve(config: &PresenceConfig, provider: &ProviderSettings) -> Self {
        let stream_url = config
            .stream_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| provider.watch_url());

        Self {
            stream_url,
            live_label: config.live_label.clone(),
            offline_label: config.offline_label.clone(),
            error_label: config.error_label.clone(),
        }
    }

    pub fn live(&self) -> Presence {
        Presence {
            label: self.live_label.clone(),
            url: self.stream_url.clone(),
        }
    }

    pub fn offline(&self) -> Presence {
        Presence {
            label: self.offline_label.clone(),
            url: self.stream_url.clone(),
        }
    }

    pub fn error(&self) -> Presence {
        Presence {
            label: self.error_label.clone(),
            url: None,
        }
    }
}

pub struct PresenceReflector<S> {
    sink: S,
    settings: PresenceSettings,
}

impl<S: PresenceSink> PresenceReflector<S> {
    pub fn new(sink: S, settings: PresenceSettings) -> Self {
        Self { sink, settings }
    }

    async fn push(&self, presence: Presence) {
        if let Err(err) = self.sink.set_presence(&presence).await {
            tracing::error!(label = %presence.label, "Failed to update presence: {err:#}");
        }
    }
}

#[async_trait]
impl<S: PresenceSink> TransitionHandler for PresenceReflector<S> {
    async fn on_live(&self) {
        tracing::info!("Updating presence to live.");
        self.push(self.settings.live()).await;
    }

    async fn on_offline(&self) {
        tracing::info!("Updating presence to offline.");
        self.push(self.settings.offline()).await;
    }

    async fn on_error(&self, cause: &PollError) {
        tracing::warn!(kind = %cause.kind, "Updating presence to error: {cause}");
        self.push(self.settings.error()).await;
    }
}
