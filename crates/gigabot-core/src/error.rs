//! Error taxonomy shared by the token manager, chat client and bridge.
//!
//! Every variant is `Clone` so that a failed token acquisition can be handed
//! to all callers that were waiting on it.

use thiserror::Error;

/// Result alias used across the Gigabot library crates.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The OAuth endpoint rejected the request, or answered 200 without an
    /// `access_token`.
    #[error("authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// The chat completion endpoint answered with a non-200 status.
    #[error("chat request failed (HTTP {status}): {body}")]
    Chat { status: u16, body: String },

    /// A named field was not present in a response body.
    #[error("field `{field}` not found in response")]
    ExtractionMiss { field: String },

    #[error("message is empty")]
    EmptyInput,

    /// Network or IO level failure below HTTP.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the upstream rejected the credentials used for this call.
    ///
    /// Only a chat call rejected with 401/403 qualifies: it means the cached
    /// bearer token is stale and a fresh one may succeed.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, BridgeError::Chat { status: 401 | 403, .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Auth { status, .. } | BridgeError::Chat { status, .. } => Some(*status),
            _ => None,
        }
    }
}
