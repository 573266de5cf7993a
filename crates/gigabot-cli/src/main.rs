//! Gigabot CLI: entry point.
//!
//! # Commands
//!
//! - `gigabot chat [-m MESSAGE]`: talk to GigaChat from the terminal
//! - `gigabot gateway`: run the Telegram bot
//! - `gigabot onboard`: write a default config file
//! - `gigabot status`: show configuration status

mod gateway;
mod helpers;
mod onboard;
mod repl;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use gigabot_agent::Bridge;
use gigabot_core::config::{load_config, Config};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Gigabot: relay chat messages to GigaChat
#[derive(Parser)]
#[command(name = "gigabot", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.gigabot/config.json
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with GigaChat (single-shot or interactive console)
    Chat {
        /// Single message (non-interactive). Omit for console mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Start the gateway (Telegram channel + bridge)
    Gateway {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Create the default configuration file
    Onboard,

    /// Show configuration status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(helpers::expand_tilde);

    match cli.command {
        Commands::Chat { message, logs } => {
            init_logging(logs);
            run_chat(message, config_path).await
        }
        Commands::Gateway { logs } => {
            init_logging(logs);
            let config = load_config(config_path.as_deref());
            gateway::run(config).await
        }
        Commands::Onboard => onboard::run(config_path),
        Commands::Status => status::run(config_path),
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(message: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref());
    let bridge = build_bridge(&config)?;

    match message {
        Some(msg) => {
            info!("processing single message");
            let reply = bridge.handle(&msg).await;
            helpers::print_response(&reply);
        }
        None => repl::run(bridge).await?,
    }

    Ok(())
}

/// Build the bridge shared by every entry point.
pub fn build_bridge(config: &Config) -> Result<Arc<Bridge>> {
    let bridge = Bridge::from_config(Arc::new(config.gigachat.clone())).context(
        "GigaChat is not configured; run `gigabot onboard` and set gigachat.authorizationKey",
    )?;
    Ok(Arc::new(bridge))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("gigabot=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
