//! GigaChat chat completion client.
//!
//! Sends a single user prompt (no history, no streaming) and pulls the reply
//! out of the response with the field extractor.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, error, warn};

use gigabot_core::config::GigaChatConfig;
use gigabot_core::{BridgeError, Result};

use crate::extract::extract_string_field;
use crate::http::{build_client, read_body, transport_error};
use crate::traits::ChatBackend;

/// Reply returned when a 200 response carries no `content` field.
pub const NO_REPLY_CONTENT: &str = "no reply content found in response";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    repetition_penalty: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn user_prompt(model: &'a str, prompt: &'a str) -> Self {
        ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            repetition_penalty: 1,
        }
    }
}

// ─────────────────────────────────────────────
// GigaChatClient
// ─────────────────────────────────────────────

/// Client for the chat completions endpoint.
pub struct GigaChatClient {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    config: Arc<GigaChatConfig>,
}

impl std::fmt::Debug for GigaChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GigaChatClient")
            .field("chat_url", &self.config.chat_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl GigaChatClient {
    pub fn new(config: Arc<GigaChatConfig>) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Arc<GigaChatConfig>, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Send one prompt with the given bearer token.
    ///
    /// A 200 without `content` yields [`NO_REPLY_CONTENT`] rather than an error.
    pub async fn send_prompt(&self, token: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest::user_prompt(&self.config.model, prompt);

        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "calling chat completions"
        );

        let response = self
            .client
            .post(&self.config.chat_url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "chat request failed");
                transport_error(e)
            })?;

        let status = response.status();
        let body = read_body(response).await?;

        if status != StatusCode::OK {
            error!(status = %status, body = %body, "chat API error");
            return Err(BridgeError::Chat {
                status: status.as_u16(),
                body,
            });
        }

        match extract_string_field(&body, "content") {
            Some(reply) => {
                if reply.truncated {
                    warn!("reply content was not terminated, relaying it as-is");
                }
                debug!(reply_len = reply.value.len(), "chat reply received");
                Ok(reply.value)
            }
            None => {
                warn!(body_len = body.len(), "no content field in chat response");
                Ok(NO_REPLY_CONTENT.to_string())
            }
        }
    }
}

#[async_trait]
impl ChatBackend for GigaChatClient {
    async fn send_prompt(&self, token: &str, prompt: &str) -> Result<String> {
        GigaChatClient::send_prompt(self, token, prompt).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
