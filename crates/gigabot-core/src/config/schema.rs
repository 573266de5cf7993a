//! Configuration schema.
//!
//! Hierarchy: `Config` → `GigaChatConfig`, `TelegramConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_CHAT_URL: &str =
    "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";
pub const DEFAULT_SCOPE: &str = "GIGACHAT_API_PERS";
pub const DEFAULT_MODEL: &str = "GigaChat";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.gigabot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub gigachat: GigaChatConfig,
    pub telegram: TelegramConfig,
}

// ─────────────────────────────────────────────
// GigaChat API
// ─────────────────────────────────────────────

/// Endpoints and credentials for the AI service.
///
/// Built once at startup, then shared read-only (behind an `Arc`) by the
/// token manager and the chat client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GigaChatConfig {
    /// OAuth token endpoint.
    pub oauth_url: String,
    /// Chat completions endpoint.
    pub chat_url: String,
    /// Pre-shared authorization key, `Basic <base64>` (prefix optional).
    pub authorization_key: String,
    /// OAuth scope sent with each token request.
    pub scope: String,
    /// Model name sent with each chat request.
    pub model: String,
    /// Upper bound for every HTTP call, in seconds.
    pub request_timeout_secs: u64,
    /// Refresh the token ahead of its advertised expiry instead of waiting
    /// for the chat endpoint to reject it.
    pub proactive_refresh: bool,
}

impl Default for GigaChatConfig {
    fn default() -> Self {
        Self {
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            chat_url: DEFAULT_CHAT_URL.to_string(),
            authorization_key: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 60,
            proactive_refresh: false,
        }
    }
}

impl GigaChatConfig {
    /// Whether an authorization key has been provided.
    pub fn is_configured(&self) -> bool {
        !self.authorization_key.trim().is_empty()
    }

    /// Value for the `Authorization` header of token requests.
    ///
    /// A bare base64 key gets the `Basic ` prefix added.
    pub fn authorization_header(&self) -> String {
        let key = self.authorization_key.trim();
        if key.starts_with("Basic ") {
            key.to_string()
        } else {
            format!("Basic {key}")
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Reject configurations the bridge cannot work with.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("oauthUrl", &self.oauth_url),
            ("chatUrl", &self.chat_url),
            ("authorizationKey", &self.authorization_key),
            ("scope", &self.scope),
            ("model", &self.model),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("gigachat.{name} is empty")));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Telegram
// ─────────────────────────────────────────────

/// Telegram channel config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    /// Bot username (informational, shown in logs).
    pub username: String,
    /// Bot token from @BotFather.
    pub token: String,
    /// User IDs or usernames allowed to talk to the bot. Empty = everyone.
    pub allowed_users: Vec<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
