use anyhow::Result;
use streamwatch_core::config::{self, Config};

pub async fn run(config: Config) -> Result<()> {
    let config_path = config::paths::config_path();
    if config_path.exists() {
        tracing::info!("Config file: {}", config_path.display());
    }
    streamwatch_bot::run(config).await
}
