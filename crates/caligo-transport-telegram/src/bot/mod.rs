/// `ChatClient` over the Telegram Bot API
pub mod client;
/// Command parsing and command handlers
pub mod handlers;
/// `t.me` message link parsing
pub mod link;
/// Conversion of Telegram messages into core messages
pub mod media;
/// Cache of observed messages, media groups and status aliases
pub mod message_cache;
/// Status-message `Responder`
pub mod responder;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;

pub use client::TelegramChatClient;
pub use message_cache::MessageCache;
pub use responder::TelegramResponder;
