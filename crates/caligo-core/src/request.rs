//! Transport-agnostic request identity types.

use std::fmt;

/// Identifier of the user request that started a transfer.
///
/// A request is the command message itself, so the pair of chat and message
/// id is unique for the lifetime of the process.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RequestId {
    chat_id: i64,
    message_id: i32,
}

impl RequestId {
    /// Create a request id from the chat and command message ids.
    #[must_use]
    pub const fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }

    /// Chat the request was issued in.
    #[must_use]
    pub const fn chat_id(self) -> i64 {
        self.chat_id
    }

    /// Message id of the command message.
    #[must_use]
    pub const fn message_id(self) -> i32 {
        self.message_id
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message_id)
    }
}

/// Reference to a chat, either by numeric id or public username
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChatRef {
    /// Numeric chat id
    Id(i64),
    /// Public username without the leading `@`
    Username(String),
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

/// Reference to a single message in a chat
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageRef {
    /// Chat containing the message
    pub chat: ChatRef,
    /// Message id inside that chat
    pub message_id: i32,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat, self.message_id)
    }
}
