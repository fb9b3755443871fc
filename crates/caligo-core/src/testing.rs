//! Testing helpers and mock utilities.
//!
//! Provides message fixtures and pre-wired `MockChatClient` instances.

use crate::client::MockChatClient;
use crate::error::ClientError;
use crate::media::{MediaKind, MediaLocator, RemoteMedia, RemoteMessage};

/// Chat id used by all fixtures.
pub const TEST_CHAT_ID: i64 = 100;

/// A message carrying a photo without declared name or timestamp.
#[must_use]
pub fn photo_message(message_id: i32, media_group_id: Option<&str>) -> RemoteMessage {
    RemoteMessage {
        chat_id: TEST_CHAT_ID,
        message_id,
        media_group_id: media_group_id.map(ToString::to_string),
        media: Some(RemoteMedia {
            kind: MediaKind::Photo,
            locator: MediaLocator::new(format!("photo-{message_id}")),
            file_name: None,
            timestamp: None,
            size: 1024,
        }),
    }
}

/// A text-only message.
#[must_use]
pub fn plain_message(message_id: i32) -> RemoteMessage {
    RemoteMessage {
        chat_id: TEST_CHAT_ID,
        message_id,
        media_group_id: None,
        media: None,
    }
}

/// Create a mock chat client whose media group lookup returns `group` once.
#[must_use]
pub fn mock_client_with_group(group: Result<Vec<RemoteMessage>, ClientError>) -> MockChatClient {
    let mut mock = MockChatClient::new();
    mock.expect_fetch_media_group()
        .times(1)
        .return_once(move |_, _| group);
    mock
}
