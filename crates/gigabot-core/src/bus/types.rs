//! Bus event types: messages flowing between channels and the bridge.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// An inbound message from a channel to the bridge.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Channel name (e.g. "telegram", "cli").
    pub channel: String,
    /// Sender identifier within the channel.
    pub sender_id: String,
    /// Chat/conversation identifier. Replies are routed back here.
    pub chat_id: String,
    /// Text content of the message.
    pub content: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Channel-specific metadata (e.g. message_id).
    pub metadata: HashMap<String, String>,
}

impl InboundMessage {
    /// Create a new inbound message with minimal required fields.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        InboundMessage {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Conversation key combining channel and chat_id (e.g. "telegram:123456").
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Build the outbound reply addressed to the chat this message came from.
    pub fn reply(&self, content: impl Into<String>) -> OutboundMessage {
        let mut out = OutboundMessage::new(&self.channel, &self.chat_id, content);
        out.reply_to = self.metadata.get("message_id").cloned();
        out
    }
}

/// An outbound message from the bridge to a channel.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Target channel name.
    pub channel: String,
    /// Target chat/conversation identifier.
    pub chat_id: String,
    /// Text content to send.
    pub content: String,
    /// Optional message ID to reply to.
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        OutboundMessage {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
        }
    }
}
