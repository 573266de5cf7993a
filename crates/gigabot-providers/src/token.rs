//! OAuth token manager for the GigaChat API.
//!
//! Holds at most one bearer token, shared by every chat the bridge serves.
//!
//! # States
//!
//! - **NoToken** (initial): the next [`TokenManager::get_valid_token`] call
//!   hits the OAuth endpoint.
//! - **HaveToken**: the cached value is returned without any network call.
//!
//! The token is considered valid until the chat endpoint rejects it; the
//! bridge then calls [`TokenManager::invalidate_stale`] and asks again. With
//! `proactiveRefresh` enabled, a token whose advertised expiry is less than a
//! minute away is also treated as absent.
//!
//! # Concurrency
//!
//! The cached token sits behind an `RwLock`, so readers always see a whole
//! token or none. Acquisitions are serialized by a separate mutex: callers
//! that miss the cache queue on it and re-check the cache once they hold it,
//! so N simultaneous misses cost one OAuth call. If that call fails, the
//! queued callers receive the same failure instead of retrying it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use gigabot_core::config::GigaChatConfig;
use gigabot_core::{BridgeError, Result};

use crate::extract::{extract_integer_field, extract_string_field};
use crate::http::{build_client, read_body, transport_error};
use crate::traits::TokenSource;

/// Header carrying the per-request correlator expected by the OAuth endpoint.
const RQUID_HEADER: &str = "RqUID";

/// How long before the advertised expiry a token stops being reused when
/// proactive refresh is on.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ─────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────

/// A bearer token as issued by the OAuth endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    /// Expiry advertised by the endpoint (`expires_in` or `expires_at`).
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Build a token from a successful OAuth response body.
    fn from_response(body: &str, obtained_at: DateTime<Utc>) -> Result<Self> {
        let extracted = extract_string_field(body, "access_token").ok_or_else(|| {
            BridgeError::ExtractionMiss {
                field: "access_token".into(),
            }
        })?;
        if extracted.truncated {
            warn!("access_token value was not terminated, using it as-is");
        }

        let expires_at = extract_integer_field(body, "expires_in")
            // Out-of-range lifetimes count as no advertised expiry.
            .and_then(|secs| {
                Duration::try_seconds(secs).and_then(|d| obtained_at.checked_add_signed(d))
            })
            .or_else(|| {
                extract_integer_field(body, "expires_at")
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            });

        Ok(Token {
            value: extracted.value,
            obtained_at,
            expires_at,
        })
    }

    /// Whether the token is still outside the expiry margin at `now`.
    /// Tokens without an advertised expiry never go stale.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
                .is_some_and(|stale_from| stale_from > now),
            None => true,
        }
    }
}

// ─────────────────────────────────────────────
// TokenManager
// ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct TokenState {
    current: Option<Token>,
    /// Completed acquisition attempts, successful or not.
    attempts: u64,
    /// Outcome of the most recent attempt, if it failed.
    last_failure: Option<BridgeError>,
}

/// Acquires and caches the OAuth bearer token.
pub struct TokenManager {
    client: reqwest::Client,
    config: Arc<GigaChatConfig>,
    state: RwLock<TokenState>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("oauth_url", &self.config.oauth_url)
            .field("scope", &self.config.scope)
            .finish()
    }
}

impl TokenManager {
    /// Create a token manager with its own HTTP client.
    pub fn new(config: Arc<GigaChatConfig>) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// Create a token manager on top of an existing HTTP client.
    pub fn with_client(config: Arc<GigaChatConfig>, client: reqwest::Client) -> Self {
        Self {
            client,
            config,
            state: RwLock::new(TokenState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Return the cached token, acquiring one if none is held.
    pub async fn get_valid_token(&self) -> Result<String> {
        let seen = {
            let state = self.state.read().await;
            if let Some(value) = self.usable(&state) {
                return Ok(value);
            }
            state.attempts
        };

        let _flight = self.refresh.lock().await;

        {
            let state = self.state.read().await;
            if let Some(value) = self.usable(&state) {
                debug!("token acquired by a concurrent caller");
                return Ok(value);
            }
            if state.attempts != seen {
                if let Some(failure) = &state.last_failure {
                    debug!("reusing failure of a concurrent token acquisition");
                    return Err(failure.clone());
                }
            }
        }

        self.acquire_locked().await
    }

    /// Request a new token from the OAuth endpoint, replacing any cached one.
    ///
    /// Performs exactly one network call and never retries.
    pub async fn acquire(&self) -> Result<String> {
        let _flight = self.refresh.lock().await;
        self.acquire_locked().await
    }

    /// Forget the cached token unconditionally.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.current = None;
        state.last_failure = None;
        debug!("token invalidated");
    }

    /// Forget the cached token if it is still `rejected`.
    pub async fn invalidate_stale(&self, rejected: &str) -> bool {
        let mut state = self.state.write().await;
        let is_current = state
            .current
            .as_ref()
            .is_some_and(|token| token.value == rejected);
        if is_current {
            state.current = None;
            state.last_failure = None;
            info!("cached token rejected upstream, invalidated");
        }
        is_current
    }

    /// Snapshot of the cached token, if any.
    pub async fn current(&self) -> Option<Token> {
        self.state.read().await.current.clone()
    }

    fn usable(&self, state: &TokenState) -> Option<String> {
        let token = state.current.as_ref()?;
        if self.config.proactive_refresh && !token.is_fresh_at(Utc::now()) {
            return None;
        }
        Some(token.value.clone())
    }

    /// Caller must hold `self.refresh`.
    async fn acquire_locked(&self) -> Result<String> {
        let result = self.request_token().await;

        let mut state = self.state.write().await;
        state.attempts += 1;
        match result {
            Ok(token) => {
                let value = token.value.clone();
                state.current = Some(token);
                state.last_failure = None;
                Ok(value)
            }
            Err(e) => {
                state.current = None;
                state.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<Token> {
        let rq_uid = Uuid::new_v4().to_string();
        debug!(rq_uid = %rq_uid, url = %self.config.oauth_url, "requesting access token");

        let response = self
            .client
            .post(&self.config.oauth_url)
            .header(ACCEPT, "application/json")
            .header(RQUID_HEADER, &rq_uid)
            .header(AUTHORIZATION, self.config.authorization_header())
            .form(&[("scope", self.config.scope.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(rq_uid = %rq_uid, error = %e, "token request failed");
                transport_error(e)
            })?;

        let status = response.status();
        let body = read_body(response).await?;

        if status != StatusCode::OK {
            error!(
                rq_uid = %rq_uid,
                status = %status,
                body = %body,
                "failed to obtain access token"
            );
            return Err(BridgeError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        // Without a token the response is as good as a rejection.
        let token = Token::from_response(&body, Utc::now()).map_err(|e| {
            warn!(rq_uid = %rq_uid, error = %e, "unusable OAuth response");
            BridgeError::Auth {
                status: status.as_u16(),
                body,
            }
        })?;
        info!(
            rq_uid = %rq_uid,
            expires_at = ?token.expires_at,
            "access token obtained"
        );
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn get_valid_token(&self) -> Result<String> {
        TokenManager::get_valid_token(self).await
    }

    async fn invalidate_stale(&self, rejected: &str) -> bool {
        TokenManager::invalidate_stale(self, rejected).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
