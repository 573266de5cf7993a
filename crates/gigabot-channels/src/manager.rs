//! Channel Manager: runs the registered channels and routes replies.
//!
//! Each channel's `start()` runs on its own task. One more task drains the
//! bus outbound queue and hands every `OutboundMessage` to the channel it
//! names. `stop_all()` ends both.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gigabot_core::bus::queue::MessageBus;
use gigabot_core::bus::types::OutboundMessage;

use crate::base::Channel;

type ChannelMap = HashMap<String, Arc<dyn Channel>>;

// ─────────────────────────────────────────────
// ChannelManager
// ─────────────────────────────────────────────

pub struct ChannelManager {
    channels: ChannelMap,
    bus: Arc<MessageBus>,
    shutdown: Arc<Notify>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            channels: HashMap::new(),
            bus,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a channel. A channel with the same name is replaced.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registered channel");
        self.channels.insert(name, channel);
    }

    /// Names of all registered channels, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel and the outbound router, then wait for shutdown.
    pub async fn start_all(&self) -> Result<()> {
        if self.channels.is_empty() {
            warn!("no channels registered, nothing to start");
            return Ok(());
        }

        info!(channels = ?self.channel_names(), "starting channels");

        let mut tasks: Vec<JoinHandle<()>> = self
            .channels
            .iter()
            .map(|(name, channel)| spawn_channel(name.clone(), channel.clone()))
            .collect();

        tasks.push(tokio::spawn(route_outbound(
            self.bus.clone(),
            self.channels.clone(),
            self.shutdown.clone(),
        )));

        self.shutdown.notified().await;

        info!("channel manager shutting down");
        for task in tasks {
            task.abort();
        }
        Ok(())
    }

    /// Ask every channel to stop and release `start_all()`.
    pub async fn stop_all(&self) {
        info!("stopping all channels");
        self.shutdown.notify_waiters();

        for (name, channel) in &self.channels {
            debug!(channel = %name, "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %name, error = %e, "channel stop failed");
            }
        }
    }
}

fn spawn_channel(name: String, channel: Arc<dyn Channel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(channel = %name, "channel starting");
        if let Err(e) = channel.start().await {
            error!(channel = %name, error = %e, "channel exited with error");
        }
        info!(channel = %name, "channel stopped");
    })
}

/// Deliver outbound messages until the bus closes or shutdown is signalled.
async fn route_outbound(bus: Arc<MessageBus>, channels: ChannelMap, shutdown: Arc<Notify>) {
    debug!("outbound router started");

    loop {
        tokio::select! {
            msg = bus.consume_outbound() => match msg {
                Some(outbound) => deliver(&channels, &outbound).await,
                None => {
                    info!("outbound bus closed, router exiting");
                    break;
                }
            },
            _ = shutdown.notified() => {
                debug!("outbound router received shutdown signal");
                break;
            }
        }
    }
}

async fn deliver(channels: &ChannelMap, outbound: &OutboundMessage) {
    let Some(channel) = channels.get(&outbound.channel) else {
        warn!(channel = %outbound.channel, "no channel registered for outbound message");
        return;
    };

    debug!(
        channel = %outbound.channel,
        chat_id = %outbound.chat_id,
        content_len = outbound.content.len(),
        "delivering reply"
    );

    if let Err(e) = channel.send(outbound).await {
        error!(
            channel = %outbound.channel,
            chat_id = %outbound.chat_id,
            error = %e,
            "failed to deliver reply"
        );
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
