//! `t.me` message links.
//!
//! Two shapes are accepted: `t.me/c/<internal_id>/<msg_id>` for private
//! chats, addressed as `-100<internal_id>`, and `t.me/<username>/<msg_id>`
//! for public ones. Topic links carry the thread id before the message id.

use caligo_core::{ChatRef, MessageRef, TransmissionError};
use lazy_regex::regex_captures;

/// Parse a message link into a [`MessageRef`].
///
/// # Errors
///
/// Returns [`TransmissionError::InvalidTarget`] for anything that is not a
/// message link.
pub fn parse_telegram_link(input: &str) -> Result<MessageRef, TransmissionError> {
    let link = input.trim();
    let invalid = || TransmissionError::InvalidTarget(link.to_string());

    if let Some((_, internal_id, message_id)) = regex_captures!(
        r"^(?:https?://)?(?:t|telegram)\.me/c/(\d+)/(?:\d+/)?(\d+)/?(?:\?.*)?$",
        link
    ) {
        let chat_id = format!("-100{internal_id}")
            .parse::<i64>()
            .map_err(|_| invalid())?;
        let message_id = message_id.parse::<i32>().map_err(|_| invalid())?;
        return Ok(MessageRef {
            chat: ChatRef::Id(chat_id),
            message_id,
        });
    }

    if let Some((_, username, message_id)) = regex_captures!(
        r"^(?:https?://)?(?:t|telegram)\.me/([A-Za-z][A-Za-z0-9_]{3,31})/(\d+)/?(?:\?.*)?$",
        link
    ) {
        let message_id = message_id.parse::<i32>().map_err(|_| invalid())?;
        return Ok(MessageRef {
            chat: ChatRef::Username(username.to_string()),
            message_id,
        });
    }

    Err(invalid())
}
