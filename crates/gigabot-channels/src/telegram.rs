//! Telegram channel: long-polling bot via `teloxide`.
//!
//! - Text messages only; photos, stickers and other media are ignored
//! - Allow-list by user ID or username
//! - Commands: /start, /help; other commands are relayed like any text
//! - Typing indicator until the reply is sent
//! - Replies sent as plain text, split at 4096 UTF-16 code units

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction, MessageId, ReplyParameters, UpdateKind};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gigabot_core::bus::queue::MessageBus;
use gigabot_core::bus::types::{InboundMessage, OutboundMessage};
use gigabot_core::config::TelegramConfig;
use gigabot_core::utils::mask_secret;

use crate::base::Channel;
use crate::formatting::split_message;

/// Telegram message length limit, in UTF-16 code units.
const TELEGRAM_MAX_LEN: usize = 4096;

/// Long-poll timeout for `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Upper bound on how long the typing indicator is kept alive.
const TYPING_MAX: Duration = Duration::from_secs(120);

const HELP_TEXT: &str = "Send me any text and I'll pass it to GigaChat and reply with its answer.\n\n\
     Commands:\n\
     /start - Start the bot\n\
     /help - Show this message";

/// Bot identity and token as configured.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("username", &self.username)
            .field("token", &mask_secret(&self.token))
            .finish()
    }
}

// ─────────────────────────────────────────────
// TelegramChannel
// ─────────────────────────────────────────────

pub struct TelegramChannel {
    bot: Bot,
    credentials: TelegramCredentials,
    bus: Arc<MessageBus>,
    /// User IDs / usernames. Empty = allow everyone.
    allowed_users: Vec<String>,
    /// Typing indicators per chat, stopped once the reply goes out.
    typing: Mutex<HashMap<i64, JoinHandle<()>>>,
    shutdown: Arc<Notify>,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig, bus: Arc<MessageBus>) -> Self {
        Self {
            bot: Bot::new(config.token.trim()),
            credentials: TelegramCredentials {
                username: config.username.clone(),
                token: config.token.trim().to_string(),
            },
            bus,
            allowed_users: config.allowed_users.clone(),
            typing: Mutex::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn credentials(&self) -> &TelegramCredentials {
        &self.credentials
    }

    /// Sender ID format is `user_id|username`; either part may match.
    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.allowed_users.is_empty() {
            return true;
        }

        std::iter::once(sender_id)
            .chain(sender_id.split('|'))
            .filter(|part| !part.is_empty())
            .any(|part| self.allowed_users.iter().any(|u| u == part))
    }

    /// Fails when no token is configured; a missing username only warns.
    fn check_credentials(&self) -> anyhow::Result<()> {
        if self.credentials.token.is_empty() {
            error!("telegram bot token is not configured");
            anyhow::bail!("telegram.token is empty");
        }
        if self.credentials.username.trim().is_empty() {
            warn!("telegram bot username is not configured");
        }
        Ok(())
    }

    async fn handle_update(&self, update: &Update) {
        let UpdateKind::Message(message) = &update.kind else {
            return;
        };
        let Some(user) = message.from.as_ref() else {
            return;
        };

        let user_id = user.id.0.to_string();
        let username = user.username.clone().unwrap_or_default();
        let sender_id = format!("{user_id}|{username}");
        let chat_id = message.chat.id;

        if !self.is_allowed(&sender_id) {
            warn!(sender = %sender_id, chat = chat_id.0, "telegram message from unauthorized user, ignoring");
            return;
        }

        let Some(text) = message.text() else {
            debug!(chat = chat_id.0, "non-text telegram message, ignoring");
            return;
        };

        // Only known commands are answered locally; anything else is a prompt.
        if let Some(reply) = parse_command(text).and_then(|c| command_reply(c, &user.first_name)) {
            if let Err(e) = self.bot.send_message(chat_id, reply).await {
                warn!(error = %e, "failed to answer telegram command");
            }
            return;
        }

        debug!(
            sender = %sender_id,
            chat = chat_id.0,
            content_len = text.len(),
            "telegram inbound message"
        );

        self.start_typing(chat_id);

        let inbound = inbound_message(&sender_id, chat_id, message.id, text);
        if let Err(e) = self.bus.publish_inbound(inbound).await {
            error!(error = %e, "failed to publish telegram message to bus");
            self.stop_typing(chat_id.0);
        }
    }

    fn start_typing(&self, chat: ChatId) {
        let bot = self.bot.clone();
        let handle = tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + TYPING_MAX;
            while tokio::time::Instant::now() < deadline {
                if let Err(e) = bot.send_chat_action(chat, ChatAction::Typing).await {
                    debug!(error = %e, "typing indicator failed");
                    break;
                }
                tokio::time::sleep(Duration::from_secs(4)).await;
            }
        });

        if let Ok(mut typing) = self.typing.lock() {
            if let Some(previous) = typing.insert(chat.0, handle) {
                previous.abort();
            }
        }
    }

    fn stop_typing(&self, chat: i64) {
        if let Ok(mut typing) = self.typing.lock() {
            if let Some(handle) = typing.remove(&chat) {
                handle.abort();
            }
        }
    }
}

/// Local answer for a bot command, or `None` if it should be relayed.
fn command_reply(command: &str, first_name: &str) -> Option<String> {
    match command {
        "/start" => Some(format!("Hi {first_name}! I'm a GigaChat assistant.\n\n{HELP_TEXT}")),
        "/help" => Some(HELP_TEXT.to_string()),
        _ => None,
    }
}

/// Bus message for a relayed text; the message ID lets the reply thread to it.
fn inbound_message(sender_id: &str, chat: ChatId, message: MessageId, text: &str) -> InboundMessage {
    let mut inbound = InboundMessage::new("telegram", sender_id, chat.0.to_string(), text);
    inbound
        .metadata
        .insert("message_id".into(), message.0.to_string());
    inbound
}

/// Command name without arguments or the `@botname` suffix.
fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    first.split('@').next()
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.check_credentials()?;

        info!(
            username = %self.credentials.username,
            "starting telegram channel (long polling)"
        );

        let commands = vec![
            BotCommand::new("start", "Start the bot"),
            BotCommand::new("help", "Show available commands"),
        ];
        if let Err(e) = self.bot.set_my_commands(commands).await {
            warn!(error = %e, "failed to set bot commands menu");
        }

        let mut offset: i32 = 0;

        loop {
            tokio::select! {
                updates = self.bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS).send() => {
                    match updates {
                        Ok(updates) => {
                            for update in &updates {
                                offset = (update.id.0 as i32).wrapping_add(1);
                                self.handle_update(update).await;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "telegram polling error");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("telegram channel shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.shutdown.notify_waiters();
        if let Ok(mut typing) = self.typing.lock() {
            for (_, handle) in typing.drain() {
                handle.abort();
            }
        }
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        let chat_id: i64 = msg
            .chat_id
            .parse()
            .with_context(|| format!("invalid telegram chat_id: {}", msg.chat_id))?;
        self.stop_typing(chat_id);

        let reply_to = msg
            .reply_to
            .as_deref()
            .and_then(|id| id.parse::<i32>().ok())
            .map(MessageId);

        for (i, chunk) in split_message(&msg.content, TELEGRAM_MAX_LEN).iter().enumerate() {
            let mut request = self.bot.send_message(ChatId(chat_id), chunk);
            if let (0, Some(id)) = (i, reply_to) {
                request = request.reply_parameters(ReplyParameters::new(id));
            }
            request
                .await
                .with_context(|| format!("failed to send telegram message to {chat_id}"))?;
        }

        debug!(chat_id, "telegram message sent");
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(allowed: &[&str]) -> TelegramChannel {
        let config = TelegramConfig {
            username: "giga_helper_bot".into(),
            token: "123456:test-token".into(),
            allowed_users: allowed.iter().map(|s| s.to_string()).collect(),
        };
        TelegramChannel::new(&config, Arc::new(MessageBus::new(8)))
    }

    #[test]
    fn test_channel_name() {
        assert_eq!(channel(&[]).name(), "telegram");
    }

    #[test]
    fn test_credentials_exposed() {
        let ch = channel(&[]);
        assert_eq!(
            ch.credentials(),
            &TelegramCredentials {
                username: "giga_helper_bot".into(),
                token: "123456:test-token".into(),
            }
        );
    }

    #[test]
    fn test_credentials_debug_masks_token() {
        let debug = format!("{:?}", channel(&[]).credentials());
        assert!(debug.contains("giga_helper_bot"));
        assert!(!debug.contains("test-token"));
    }

    #[test]
    fn test_check_credentials() {
        assert!(channel(&[]).check_credentials().is_ok());

        let empty = TelegramChannel::new(&TelegramConfig::default(), Arc::new(MessageBus::new(8)));
        assert!(empty.check_credentials().is_err());
    }

    #[tokio::test]
    async fn test_start_without_token_fails_fast() {
        let empty = TelegramChannel::new(&TelegramConfig::default(), Arc::new(MessageBus::new(8)));
        assert!(empty.start().await.is_err());
    }

    #[test]
    fn test_is_allowed_empty_list() {
        let ch = channel(&[]);
        assert!(ch.is_allowed("anyone"));
        assert!(ch.is_allowed("123|user"));
    }

    #[test]
    fn test_is_allowed_by_id_or_username() {
        let ch = channel(&["123456", "johndoe"]);
        assert!(ch.is_allowed("123456|someuser"));
        assert!(ch.is_allowed("999999|johndoe"));
        assert!(ch.is_allowed("123456"));
        assert!(!ch.is_allowed("999999|stranger"));
        assert!(!ch.is_allowed("999999|"));
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("/start"));
        assert_eq!(parse_command("/help@giga_helper_bot"), Some("/help"));
        assert_eq!(parse_command("/start now"), Some("/start"));
        assert_eq!(parse_command("hello /start"), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_known_commands_answered_locally() {
        let start = command_reply("/start", "Anna").unwrap();
        assert!(start.starts_with("Hi Anna!"));
        assert!(start.contains("/help"));
        assert_eq!(command_reply("/help", "Anna").as_deref(), Some(HELP_TEXT));
    }

    #[test]
    fn test_unknown_commands_are_relayed() {
        assert_eq!(command_reply("/translate", "Anna"), None);
        assert_eq!(command_reply("/", "Anna"), None);
    }

    #[test]
    fn test_inbound_message_carries_only_message_id() {
        let inbound = inbound_message("42|anna", ChatId(-100), MessageId(7), "/translate hi");
        assert_eq!(inbound.channel, "telegram");
        assert_eq!(inbound.sender_id, "42|anna");
        assert_eq!(inbound.chat_id, "-100");
        assert_eq!(inbound.content, "/translate hi");
        assert_eq!(inbound.metadata.len(), 1);
        assert_eq!(inbound.reply("ok").reply_to.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_send_rejects_bad_chat_id() {
        let ch = channel(&[]);
        let err = ch
            .send(&OutboundMessage::new("telegram", "not-a-number", "hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid telegram chat_id"));
    }
}
