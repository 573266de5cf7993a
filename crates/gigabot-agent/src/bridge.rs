//! Bridge: relays one chat message to GigaChat and produces the reply text.
//!
//! Receives inbound messages, gets a bearer token, submits the prompt, and
//! publishes exactly one outbound message per inbound message. Every failure
//! is turned into text here; nothing propagates to the transport.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use gigabot_core::bus::queue::MessageBus;
use gigabot_core::bus::types::InboundMessage;
use gigabot_core::config::GigaChatConfig;
use gigabot_core::utils::truncate_string;
use gigabot_core::{BridgeError, Result};
use gigabot_providers::{build_client, ChatBackend, GigaChatClient, TokenManager, TokenSource};

/// Shown when the user sends an empty or whitespace-only message.
pub const EMPTY_MESSAGE_NOTICE: &str = "Your message is empty. Please send some text.";

/// Shown for every failure that is not worth explaining to the user.
pub const GENERIC_FAILURE_NOTICE: &str =
    "Something went wrong while processing your request. Please try again.";

/// Upstream error bodies shown to the user are cut to this many characters.
const MAX_SURFACED_BODY_CHARS: usize = 1000;

/// One prompt and the text relayed back for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatExchange {
    pub prompt: String,
    pub reply: String,
}

// ─────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────

/// Drives the token source and the chat backend for each message.
///
/// Holds no per-chat state, so one instance serves every conversation
/// concurrently. The token source is the only shared mutable state.
pub struct Bridge {
    tokens: Arc<dyn TokenSource>,
    chat: Arc<dyn ChatBackend>,
}

impl Bridge {
    pub fn new(tokens: Arc<dyn TokenSource>, chat: Arc<dyn ChatBackend>) -> Self {
        Self { tokens, chat }
    }

    /// Build the bridge on the GigaChat clients, sharing one HTTP client.
    pub fn from_config(config: Arc<GigaChatConfig>) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;

        let tokens = TokenManager::with_client(config.clone(), client.clone());
        let chat = GigaChatClient::with_client(config.clone(), client);

        info!(
            oauth_url = %config.oauth_url,
            chat_url = %config.chat_url,
            model = %config.model,
            "bridge initialized"
        );

        Ok(Self::new(Arc::new(tokens), Arc::new(chat)))
    }

    /// Model the chat backend talks to.
    pub fn model(&self) -> &str {
        self.chat.model()
    }

    /// Relay `text` and return what should be sent back to the user.
    pub async fn handle(&self, text: &str) -> String {
        self.exchange(text).await.reply
    }

    /// Relay `prompt`, returning both sides of the exchange.
    pub async fn exchange(&self, prompt: &str) -> ChatExchange {
        let reply = match self.relay(prompt).await {
            Ok(reply) => reply,
            Err(BridgeError::EmptyInput) => {
                debug!("empty prompt, not relayed");
                EMPTY_MESSAGE_NOTICE.to_string()
            }
            Err(e) => {
                error!(error = %e, "failed to relay prompt");
                failure_text(&e)
            }
        };

        debug!(
            prompt_len = prompt.len(),
            reply_len = reply.len(),
            "exchange complete"
        );

        ChatExchange {
            prompt: prompt.to_string(),
            reply,
        }
    }

    async fn relay(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(BridgeError::EmptyInput);
        }

        let token = self.tokens.get_valid_token().await?;

        match self.chat.send_prompt(&token, prompt).await {
            Err(e) if e.is_auth_rejection() => {
                warn!(
                    status = e.status().unwrap_or_default(),
                    "chat endpoint rejected the token, refreshing once"
                );
                self.tokens.invalidate_stale(&token).await;
                let fresh = self.tokens.get_valid_token().await?;
                self.chat.send_prompt(&fresh, prompt).await
            }
            other => other,
        }
    }

    /// Consume inbound messages until the bus closes.
    ///
    /// Each message is handled on its own task so a slow upstream call for
    /// one chat does not hold up the others.
    pub async fn run(self: Arc<Self>, bus: Arc<MessageBus>) {
        info!(model = %self.model(), "bridge started, waiting for messages");

        while let Some(msg) = bus.consume_inbound().await {
            let bridge = self.clone();
            let bus = bus.clone();
            tokio::spawn(async move {
                bridge.dispatch(&bus, msg).await;
            });
        }

        info!("inbound channel closed, bridge exiting");
    }

    async fn dispatch(&self, bus: &MessageBus, msg: InboundMessage) {
        debug!(
            conversation = %msg.conversation_key(),
            content_len = msg.content.len(),
            "received message"
        );

        let reply = self.handle(&msg.content).await;

        if let Err(e) = bus.publish_outbound(msg.reply(reply)).await {
            error!(
                conversation = %msg.conversation_key(),
                error = %e,
                "failed to publish outbound message"
            );
        }
    }
}

/// User-facing text for a failed relay.
///
/// Chat endpoint refusals are shown with their status and body so the user
/// can report them; everything else collapses into one generic notice.
fn failure_text(err: &BridgeError) -> String {
    match err {
        BridgeError::EmptyInput => EMPTY_MESSAGE_NOTICE.to_string(),
        BridgeError::Chat { status, body } => format!(
            "GigaChat request failed (HTTP {status}):\n{}",
            truncate_string(body, MAX_SURFACED_BODY_CHARS)
        ),
        _ => GENERIC_FAILURE_NOTICE.to_string(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hands out `token-1`, `token-2`, ... and counts acquisitions.
    struct FakeTokens {
        acquisitions: AtomicUsize,
        current: Mutex<Option<String>>,
        fail_with: Option<BridgeError>,
    }

    impl FakeTokens {
        fn new() -> Self {
            Self {
                acquisitions: AtomicUsize::new(0),
                current: Mutex::new(None),
                fail_with: None,
            }
        }

        fn failing(err: BridgeError) -> Self {
            Self {
                fail_with: Some(err),
                ..Self::new()
            }
        }

        fn acquisitions(&self) -> usize {
            self.acquisitions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for FakeTokens {
        async fn get_valid_token(&self) -> Result<String> {
            if let Some(err) = &self.fail_with {
                self.acquisitions.fetch_add(1, Ordering::SeqCst);
                return Err(err.clone());
            }
            let mut current = self.current.lock().unwrap();
            if let Some(token) = current.as_ref() {
                return Ok(token.clone());
            }
            let n = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
            let token = format!("token-{n}");
            *current = Some(token.clone());
            Ok(token)
        }

        async fn invalidate_stale(&self, rejected: &str) -> bool {
            let mut current = self.current.lock().unwrap();
            if current.as_deref() == Some(rejected) {
                *current = None;
                true
            } else {
                false
            }
        }
    }

    /// Returns scripted results in order and records the tokens it was given.
    struct FakeChat {
        results: Mutex<Vec<Result<String>>>,
        tokens_seen: Mutex<Vec<String>>,
    }

    impl FakeChat {
        fn new(results: Vec<Result<String>>) -> Self {
            Self {
                results: Mutex::new(results),
                tokens_seen: Mutex::new(Vec::new()),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        fn calls(&self) -> usize {
            self.tokens_seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for FakeChat {
        async fn send_prompt(&self, token: &str, _prompt: &str) -> Result<String> {
            self.tokens_seen.lock().unwrap().push(token.to_string());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok("(no more replies)".to_string())
            } else {
                results.remove(0)
            }
        }

        fn model(&self) -> &str {
            "fake-model"
        }
    }

    fn unauthorized() -> BridgeError {
        BridgeError::Chat {
            status: 401,
            body: "token expired".into(),
        }
    }

    fn bridge(tokens: &Arc<FakeTokens>, chat: &Arc<FakeChat>) -> Bridge {
        Bridge::new(tokens.clone(), chat.clone())
    }

    #[tokio::test]
    async fn test_simple_reply() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::replying("Hello from GigaChat"));

        let reply = bridge(&tokens, &chat).handle("Hi").await;
        assert_eq!(reply, "Hello from GigaChat");
        assert_eq!(tokens.acquisitions(), 1);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_token_reused_across_messages() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![Ok("one".into()), Ok("two".into())]));
        let bridge = bridge(&tokens, &chat);

        assert_eq!(bridge.handle("first").await, "one");
        assert_eq!(bridge.handle("second").await, "two");
        assert_eq!(tokens.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_whitespace_never_reach_upstream() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::replying("unused"));
        let bridge = bridge(&tokens, &chat);

        assert_eq!(bridge.handle("").await, EMPTY_MESSAGE_NOTICE);
        assert_eq!(bridge.handle("  \n\t ").await, EMPTY_MESSAGE_NOTICE);
        assert_eq!(tokens.acquisitions(), 0);
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_rejection_retried_once_with_fresh_token() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![
            Err(unauthorized()),
            Ok("after refresh".into()),
        ]));

        let reply = bridge(&tokens, &chat).handle("question").await;
        assert_eq!(reply, "after refresh");
        assert_eq!(tokens.acquisitions(), 2);
        assert_eq!(
            *chat.tokens_seen.lock().unwrap(),
            vec!["token-1".to_string(), "token-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_forbidden_also_triggers_refresh() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![
            Err(BridgeError::Chat {
                status: 403,
                body: "forbidden".into(),
            }),
            Ok("ok".into()),
        ]));

        assert_eq!(bridge(&tokens, &chat).handle("q").await, "ok");
        assert_eq!(tokens.acquisitions(), 2);
    }

    #[tokio::test]
    async fn test_second_auth_rejection_surfaced_verbatim() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![Err(unauthorized()), Err(unauthorized())]));

        let reply = bridge(&tokens, &chat).handle("q").await;
        assert!(reply.contains("401"));
        assert!(reply.contains("token expired"));
        assert_eq!(chat.calls(), 2);
        assert_eq!(tokens.acquisitions(), 2);
    }

    #[tokio::test]
    async fn test_token_failure_gives_generic_notice_without_chat_call() {
        let tokens = Arc::new(FakeTokens::failing(BridgeError::Auth {
            status: 500,
            body: "oauth down".into(),
        }));
        let chat = Arc::new(FakeChat::replying("unused"));

        let reply = bridge(&tokens, &chat).handle("q").await;
        assert_eq!(reply, GENERIC_FAILURE_NOTICE);
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_auth_chat_failure_not_retried() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![Err(BridgeError::Chat {
            status: 500,
            body: "overloaded".into(),
        })]));

        let reply = bridge(&tokens, &chat).handle("q").await;
        assert!(reply.contains("500"));
        assert!(reply.contains("overloaded"));
        assert_eq!(chat.calls(), 1);
        assert_eq!(tokens.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_timeout_and_transport_give_generic_notice() {
        for err in [BridgeError::Timeout, BridgeError::Transport("reset".into())] {
            let tokens = Arc::new(FakeTokens::new());
            let chat = Arc::new(FakeChat::new(vec![Err(err)]));
            let reply = bridge(&tokens, &chat).handle("q").await;
            assert_eq!(reply, GENERIC_FAILURE_NOTICE);
            assert_eq!(chat.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_exchange_keeps_prompt() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::replying("pong"));

        let exchange = bridge(&tokens, &chat).exchange("ping").await;
        assert_eq!(
            exchange,
            ChatExchange {
                prompt: "ping".into(),
                reply: "pong".into()
            }
        );
    }

    #[test]
    fn test_failure_text_truncates_long_bodies() {
        let err = BridgeError::Chat {
            status: 502,
            body: "x".repeat(5000),
        };
        let text = failure_text(&err);
        assert!(text.starts_with("GigaChat request failed (HTTP 502)"));
        assert!(text.chars().count() < 1100);
    }

    #[test]
    fn test_from_config_rejects_missing_key() {
        let config = Arc::new(GigaChatConfig::default());
        assert!(matches!(
            Bridge::from_config(config),
            Err(BridgeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_replies_to_each_chat() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::new(vec![Ok("same".into()), Ok("same".into())]));
        let bridge = Arc::new(bridge(&tokens, &chat));
        let bus = Arc::new(MessageBus::new(8));

        bus.publish_inbound(InboundMessage::new("telegram", "u1", "chat-1", "a"))
            .await
            .unwrap();
        bus.publish_inbound(InboundMessage::new("telegram", "u2", "chat-2", "b"))
            .await
            .unwrap();

        let runner = tokio::spawn(bridge.clone().run(bus.clone()));

        let first = bus.consume_outbound().await.unwrap();
        let second = bus.consume_outbound().await.unwrap();
        runner.abort();

        let mut chats = vec![first.chat_id, second.chat_id];
        chats.sort();
        assert_eq!(chats, vec!["chat-1", "chat-2"]);
        assert_eq!(first.content, "same");
        assert_eq!(second.content, "same");
        assert_eq!(tokens.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_run_answers_empty_message_too() {
        let tokens = Arc::new(FakeTokens::new());
        let chat = Arc::new(FakeChat::replying("unused"));
        let bridge = Arc::new(bridge(&tokens, &chat));
        let bus = Arc::new(MessageBus::new(8));

        bus.publish_inbound(InboundMessage::new("telegram", "u1", "chat-1", "   "))
            .await
            .unwrap();

        let runner = tokio::spawn(bridge.clone().run(bus.clone()));
        let out = bus.consume_outbound().await.unwrap();
        runner.abort();

        assert_eq!(out.chat_id, "chat-1");
        assert_eq!(out.content, EMPTY_MESSAGE_NOTICE);
        assert_eq!(chat.calls(), 0);
    }

    // ── Against a mock GigaChat ──

    mod upstream {
        use super::*;
        use gigabot_core::config::GigaChatConfig;
        use std::sync::Arc;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn live_bridge(server: &MockServer) -> Bridge {
            let config = Arc::new(GigaChatConfig {
                oauth_url: format!("{}/api/v2/oauth", server.uri()),
                chat_url: format!("{}/api/v1/chat/completions", server.uri()),
                authorization_key: "Basic c2VjcmV0".into(),
                ..Default::default()
            });
            Bridge::from_config(config).unwrap()
        }

        fn token(value: &str) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": value,
                "expires_at": 1706026848841i64
            }))
        }

        fn reply(content: &str) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            }))
        }

        #[tokio::test]
        async fn test_first_message_fetches_token_then_replies() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(token("tok-1"))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .and(header("Authorization", "Bearer tok-1"))
                .respond_with(reply("Hello\nworld"))
                .expect(2)
                .mount(&server)
                .await;

            let bridge = live_bridge(&server);
            assert_eq!(bridge.handle("Hi").await, "Hello\nworld");
            assert_eq!(bridge.handle("Again").await, "Hello\nworld");
        }

        #[tokio::test]
        async fn test_expired_token_refreshed_transparently() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(token("old"))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(token("new"))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .and(header("Authorization", "Bearer old"))
                .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .and(header("Authorization", "Bearer new"))
                .respond_with(reply("fresh answer"))
                .expect(1)
                .mount(&server)
                .await;

            let bridge = live_bridge(&server);
            assert_eq!(bridge.handle("question").await, "fresh answer");
        }

        #[tokio::test]
        async fn test_concurrent_rejections_refresh_token_once() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(token("old").set_delay(std::time::Duration::from_millis(100)))
                .up_to_n_times(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(token("new").set_delay(std::time::Duration::from_millis(100)))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .and(header("Authorization", "Bearer old"))
                .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .and(header("Authorization", "Bearer new"))
                .respond_with(reply("fresh answer"))
                .expect(10)
                .mount(&server)
                .await;

            let bridge = Arc::new(live_bridge(&server));
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let bridge = bridge.clone();
                    tokio::spawn(async move { bridge.handle(&format!("question {i}")).await })
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.await.unwrap(), "fresh answer");
            }
        }

        #[tokio::test]
        async fn test_oauth_down_means_no_chat_call() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/api/v2/oauth"))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/api/v1/chat/completions"))
                .respond_with(reply("unused"))
                .expect(0)
                .mount(&server)
                .await;

            let bridge = live_bridge(&server);
            assert_eq!(bridge.handle("question").await, GENERIC_FAILURE_NOTICE);
        }
    }
}
