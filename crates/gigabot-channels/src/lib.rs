//! Gigabot Channels: chat transports for the bridge.
//!
//! - **base**: the `Channel` trait every transport implements
//! - **manager**: `ChannelManager`, channel lifecycle and reply routing
//! - **telegram** (feature `telegram`): long-polling Telegram bot

pub mod base;
pub mod formatting;
pub mod manager;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use base::Channel;
pub use manager::ChannelManager;
