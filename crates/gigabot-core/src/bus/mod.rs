//! Message bus: inbound messages from channels, outbound replies to them.

pub mod queue;
pub mod types;

pub use queue::MessageBus;
pub use types::{InboundMessage, OutboundMessage};
