//! Observed message cache
//!
//! The Bot API cannot fetch chat history, so every message the bot sees is
//! kept here for a while. Link targets and media-group expansion resolve
//! against this cache. It also maps status messages back to the request that
//! created them, so an abort can reply to either.

use crate::bot::media::remote_message;
use caligo_core::{ChatRef, RemoteMessage};
use moka::future::Cache;
use std::collections::BTreeSet;
use std::time::Duration;
use teloxide::types::Message;
use tracing::debug;

/// TTL cache of observed messages, media groups, usernames and status aliases
#[derive(Clone)]
pub struct MessageCache {
    messages: Cache<(i64, i32), RemoteMessage>,
    groups: Cache<(i64, String), BTreeSet<i32>>,
    usernames: Cache<String, i64>,
    status_aliases: Cache<(i64, i32), i32>,
}

impl MessageCache {
    /// Creates a new `MessageCache`
    ///
    /// # Arguments
    ///
    /// * `ttl_secs` - Time-to-live for every entry
    /// * `max_capacity` - Maximum number of entries per table
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let ttl = Duration::from_secs(ttl_secs);
        Self {
            messages: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            groups: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            usernames: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            status_aliases: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Record a Telegram message and the chat it was posted in.
    pub async fn observe(&self, msg: &Message) {
        if let Some(username) = msg.chat.username() {
            self.remember_username(username, msg.chat.id.0).await;
        }
        self.insert(remote_message(msg)).await;
        if let Some(reply) = msg.reply_to_message() {
            self.insert(remote_message(reply)).await;
        }
    }

    /// Record a converted message and its media-group membership.
    pub async fn insert(&self, message: RemoteMessage) {
        let key = (message.chat_id, message.message_id);
        if let Some(group_id) = message.media_group_id.clone() {
            let message_id = message.message_id;
            self.groups
                .entry((message.chat_id, group_id))
                .and_upsert_with(|existing| {
                    let mut members = existing.map(moka::Entry::into_value).unwrap_or_default();
                    members.insert(message_id);
                    std::future::ready(members)
                })
                .await;
        }
        self.messages.insert(key, message).await;
    }

    /// Remember that `username` names `chat_id`.
    pub async fn remember_username(&self, username: &str, chat_id: i64) {
        self.usernames
            .insert(username.to_lowercase(), chat_id)
            .await;
    }

    /// Numeric id of a chat reference, if known.
    pub async fn resolve_chat(&self, chat: &ChatRef) -> Option<i64> {
        match chat {
            ChatRef::Id(id) => Some(*id),
            ChatRef::Username(name) => self.usernames.get(&name.to_lowercase()).await,
        }
    }

    /// A previously observed message.
    pub async fn message(&self, chat_id: i64, message_id: i32) -> Option<RemoteMessage> {
        self.messages.get(&(chat_id, message_id)).await
    }

    /// Every observed message of the media group containing `message_id`.
    ///
    /// Returns `None` if the message itself was never observed. A message
    /// outside any group is returned alone.
    pub async fn media_group(&self, chat_id: i64, message_id: i32) -> Option<Vec<RemoteMessage>> {
        let message = self.message(chat_id, message_id).await?;
        let Some(group_id) = message.media_group_id.clone() else {
            return Some(vec![message]);
        };

        let members = self
            .groups
            .get(&(chat_id, group_id))
            .await
            .unwrap_or_default();
        let mut group = Vec::with_capacity(members.len());
        for id in members {
            if let Some(member) = self.message(chat_id, id).await {
                group.push(member);
            }
        }
        debug!(chat_id, message_id, members = group.len(), "Media group looked up");
        Some(group)
    }

    /// Map a status message to the request message that created it.
    pub async fn alias_status(&self, chat_id: i64, status_id: i32, request_id: i32) {
        self.status_aliases
            .insert((chat_id, status_id), request_id)
            .await;
    }

    /// The request behind `message_id`: the aliased request for a status
    /// message, the id itself otherwise.
    pub async fn request_for(&self, chat_id: i64, message_id: i32) -> i32 {
        self.status_aliases
            .get(&(chat_id, message_id))
            .await
            .unwrap_or(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caligo_core::media::MediaLocator;
    use caligo_core::{MediaKind, RemoteMedia};

    fn photo(chat_id: i64, message_id: i32, group: Option<&str>) -> RemoteMessage {
        RemoteMessage {
            chat_id,
            message_id,
            media_group_id: group.map(ToString::to_string),
            media: Some(RemoteMedia {
                kind: MediaKind::Photo,
                locator: MediaLocator::new(format!("file-{message_id}")),
                file_name: None,
                timestamp: None,
                size: 10,
            }),
        }
    }

    #[tokio::test]
    async fn group_members_come_back_in_id_order() {
        let cache = MessageCache::new(60, 100);
        cache.insert(photo(1, 12, Some("g"))).await;
        cache.insert(photo(1, 10, Some("g"))).await;
        cache.insert(photo(1, 11, Some("g"))).await;
        cache.insert(photo(1, 13, Some("other"))).await;
        cache.insert(photo(2, 14, Some("g"))).await;

        let group = cache.media_group(1, 11).await.unwrap_or_default();
        let ids: Vec<i32> = group.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn unknown_message_has_no_group() {
        let cache = MessageCache::new(60, 100);
        assert!(cache.media_group(1, 99).await.is_none());

        cache.insert(photo(1, 5, None)).await;
        let single = cache.media_group(1, 5).await.unwrap_or_default();
        assert_eq!(single.len(), 1);
    }

    #[tokio::test]
    async fn usernames_resolve_case_insensitively() {
        let cache = MessageCache::new(60, 100);
        cache.remember_username("Some_Channel", -100_777).await;

        let chat = ChatRef::Username("some_channel".to_string());
        assert_eq!(cache.resolve_chat(&chat).await, Some(-100_777));
        assert_eq!(cache.resolve_chat(&ChatRef::Id(5)).await, Some(5));
        assert_eq!(
            cache
                .resolve_chat(&ChatRef::Username("nobody".to_string()))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn status_message_aliases_its_request() {
        let cache = MessageCache::new(60, 100);
        cache.alias_status(1, 501, 500).await;

        assert_eq!(cache.request_for(1, 501).await, 500);
        assert_eq!(cache.request_for(1, 500).await, 500);
        assert_eq!(cache.request_for(2, 501).await, 501);
    }
}
