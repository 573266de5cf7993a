//! Shared HTTP plumbing for the OAuth and chat clients.

use gigabot_core::config::GigaChatConfig;
use gigabot_core::{BridgeError, Result};

/// Build the connection-pooled client shared by both API clients.
///
/// Every request made through it is bounded by the configured timeout.
pub fn build_client(config: &GigaChatConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(transport_error)
}

/// Map a reqwest failure onto the bridge taxonomy.
///
/// Timeouts stay distinguishable from other network failures.
pub(crate) fn transport_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Timeout
    } else {
        BridgeError::Transport(e.to_string())
    }
}

/// Read a response body, treating a failed read like any other transport error.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String> {
    response.text().await.map_err(transport_error)
}
