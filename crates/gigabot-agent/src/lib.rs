//! Gigabot Agent: turns inbound chat messages into GigaChat replies.
//!
//! - **bridge**: token acquisition, the prompt call, the one-shot retry after
//!   an auth rejection, and the mapping of failures to user-facing text

pub mod bridge;

pub use bridge::{Bridge, ChatExchange, EMPTY_MESSAGE_NOTICE, GENERIC_FAILURE_NOTICE};
