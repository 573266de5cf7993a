//! Channel trait: the transport side of the bridge.
//!
//! A channel owns its connection to a chat platform. It turns platform
//! updates into `InboundMessage`s on the bus and delivers the bridge's
//! `OutboundMessage`s back to the right chat.

use async_trait::async_trait;
use gigabot_core::bus::types::OutboundMessage;

/// A chat transport the `ChannelManager` can run.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, matched against `OutboundMessage.channel`.
    fn name(&self) -> &str;

    /// Receive updates until `stop()` is called. Long-running.
    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;

    /// Deliver one reply to `msg.chat_id`.
    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;
}
