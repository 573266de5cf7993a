//! Seams between the bridge and the two GigaChat endpoints.
//!
//! The bridge only depends on these traits, so the console and the Telegram
//! gateway share one implementation and tests can substitute scripted fakes.

use async_trait::async_trait;
use gigabot_core::Result;

/// Source of bearer tokens for the chat endpoint.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return the cached token, acquiring one first if none is held.
    async fn get_valid_token(&self) -> Result<String>;

    /// Drop the cached token, but only if it is still `rejected`.
    ///
    /// Returns `true` if the cache was cleared. When several chats were
    /// refused with the same stale token, only the first clears it and the
    /// rest pick up the replacement.
    async fn invalidate_stale(&self, rejected: &str) -> bool;
}

/// A chat completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit one user prompt and return the assistant's reply text.
    ///
    /// Non-200 answers come back as `BridgeError::Chat` so the caller can
    /// tell an expired token (401/403) from a permanent failure.
    async fn send_prompt(&self, token: &str, prompt: &str) -> Result<String>;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;
}
