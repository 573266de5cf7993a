//! Gigabot core: configuration, message bus, and the shared error type.
//!
//! Everything here is transport- and HTTP-agnostic; the API clients live in
//! `gigabot-providers` and the chat integrations in `gigabot-channels`.

pub mod bus;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{BridgeError, Result};
