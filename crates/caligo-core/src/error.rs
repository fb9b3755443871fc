//! Error types for the transmission core.
//!
//! `ClientError` is what collaborators report; `TransmissionError` is what the
//! transmission manager reports to whoever issued the request. Every
//! `TransmissionError` renders as a single line fit to show to a user.

use crate::progress::Direction;
use crate::request::RequestId;
use thiserror::Error;

/// Errors reported by chat-client, responder and storage collaborators
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure talking to the chat platform
    #[error("Network error: {0}")]
    Network(String),
    /// Local disk failure
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// The platform refused the request
    #[error("Rejected by platform: {0}")]
    Rejected(String),
    /// The collaborator cannot perform this operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// The referenced object does not exist or is not reachable
    #[error("Not found: {0}")]
    NotFound(String),
    /// The operation itself crashed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Short diagnostic tag shown to users instead of the raw fault.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Storage(_) => "storage",
            Self::Rejected(_) => "rejected",
            Self::Unsupported(_) => "unsupported",
            Self::NotFound(_) => "not found",
            Self::Internal(_) => "internal",
        }
    }
}

/// A single item that failed inside a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Identifier of the item (source message id)
    pub item_id: i32,
    /// Resolved target name of the item
    pub name: String,
    /// Short diagnostic tag, see [`ClientError::tag`]
    pub tag: &'static str,
}

impl ItemFailure {
    /// Render the user-facing failure notice for this item.
    #[must_use]
    pub fn notice(&self) -> String {
        format!(
            "× <code>{}</code> failed ({})",
            html_escape::encode_text(&self.name),
            self.tag
        )
    }
}

/// Errors surfaced by the transmission manager
#[derive(Debug, Error)]
pub enum TransmissionError {
    /// The request carries no attachable media
    #[error("No media found in the message.")]
    NoMedia,
    /// The referenced path or link cannot be resolved
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    /// Cancellation was observed before the transfer finished
    #[error("Transmission aborted.")]
    Aborted,
    /// Every item of the transfer failed
    #[error("Failed to {verb} media.", verb = .direction.verb())]
    AllFailed {
        /// Direction of the failed transfer
        direction: Direction,
        /// One entry per failed item
        failures: Vec<ItemFailure>,
    },
    /// Abort referenced a request with no running task
    #[error("No running transmission for request {0}.")]
    NotFound(RequestId),
}
