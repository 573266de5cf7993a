//! GigaChat API clients for Gigabot.
//!
//! # Architecture
//!
//! - [`extract`]: pulls one named string field out of a JSON body
//! - [`token::TokenManager`]: OAuth client-credentials token, cached and shared
//! - [`chat::GigaChatClient`]: single-prompt chat completions
//! - [`traits`]: `TokenSource` / `ChatBackend` seams used by the bridge

pub mod chat;
pub mod extract;
pub mod http;
pub mod token;
pub mod traits;

pub use chat::{GigaChatClient, NO_REPLY_CONTENT};
pub use http::build_client;
pub use token::{Token, TokenManager};
pub use traits::{ChatBackend, TokenSource};
