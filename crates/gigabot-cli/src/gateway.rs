//! Gateway command: runs the bridge behind the chat channels.
//!
//! Startup sequence:
//! 1. Build the bridge from the GigaChat config
//! 2. Create the message bus
//! 3. Register configured channels
//! 4. Run bridge + channel manager until Ctrl+C

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use gigabot_channels::ChannelManager;
use gigabot_core::bus::queue::MessageBus;
use gigabot_core::config::Config;

use crate::helpers;

/// Bus capacity in each direction.
const BUS_CAPACITY: usize = 100;

pub async fn run(config: Config) -> Result<()> {
    let bridge = crate::build_bridge(&config)?;

    helpers::print_banner(bridge.model());
    println!("  Mode: Gateway");
    println!();

    let bus = Arc::new(MessageBus::new(BUS_CAPACITY));
    let channel_manager = register_channels(&config, bus.clone());

    info!(
        model = %bridge.model(),
        channels = ?channel_manager.channel_names(),
        "gateway starting"
    );

    println!("  Channels:  {} registered", channel_manager.len());
    if channel_manager.is_empty() {
        println!("  ⚠  No channels registered. Set telegram.token in");
        println!("     ~/.gigabot/config.json and build with --features telegram.");
    }
    println!();
    println!("  Ctrl+C to stop");
    println!();

    tokio::select! {
        _ = bridge.clone().run(bus.clone()) => {
            info!("bridge exited");
        }
        result = channel_manager.start_all() => {
            if let Err(e) = result {
                error!(error = %e, "channel manager error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
            channel_manager.stop_all().await;
        }
    }

    println!("  Gateway stopped. Goodbye!");
    Ok(())
}

#[cfg_attr(not(feature = "telegram"), allow(unused_variables))]
fn register_channels(config: &Config, bus: Arc<MessageBus>) -> ChannelManager {
    #[allow(unused_mut)]
    let mut manager = ChannelManager::new(bus.clone());

    #[cfg(feature = "telegram")]
    {
        let tg = &config.telegram;
        if tg.is_configured() {
            use gigabot_channels::telegram::TelegramChannel;
            let telegram = TelegramChannel::new(tg, bus);
            info!(username = %telegram.credentials().username, "registered telegram channel");
            manager.register(Arc::new(telegram));
        } else {
            tracing::warn!("telegram.token is empty, telegram channel not started");
        }
    }

    manager
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
