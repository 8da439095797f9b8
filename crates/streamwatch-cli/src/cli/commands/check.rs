//! One-shot liveness check.

use anyhow::{Context, Result};
use streamwatch_core::config::Config;
use streamwatch_core::poller::{PollerSettings, poll_with_timeout};
use streamwatch_core::provider::{ProviderSettings, build_provider};

pub async fn check(config: &Config) -> Result<()> {
    let settings = ProviderSettings::from_config(config)?;
    let poller = PollerSettings::from_config(config);
    let provider = build_provider(&settings, reqwest::Client::new());

    let live = poll_with_timeout(provider.as_ref(), poller.poll_timeout)
        .await
        .with_context(|| {
            format!(
                "poll {} input {}",
                settings.kind().display_name(),
                settings.input_id()
            )
        })?;

    println!("{}", if live { "live" } else { "offline" });
    Ok(())
}
