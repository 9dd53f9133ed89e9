//! Chat-platform adapters for Newsdesk.
//!
//! Adapters are pure I/O: they convert platform messages to/from Newsdesk
//! `InboundMessage` / `OutboundMessage`. The gateway never sees platform
//! payloads directly.

mod telegram;
mod traits;
mod types;

pub use telegram::TelegramAdapter;
pub use traits::ChannelAdapter;
pub use types::{ChannelId, ChatId, InboundMessage, MessageId, OutboundMessage, SenderId};
