//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use streamwatch_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "streamwatch")]
#[command(version)]
#[command(about = "Mirror a Cloudflare Stream live input onto a Telegram bot's presence")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the presence bot (default)
    Run,
    /// Poll the stream once and print live or offline
    Check,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write the default config file
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal.
    dotenvy::dotenv().ok();
    logging::init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        Commands::Check => {
            let config = config::Config::load().context("load config")?;
            commands::check::check(&config).await
        }
        Commands::Run => {
            let config = config::Config::load().context("load config")?;
            commands::run::run(config).await
        }
    }
}
