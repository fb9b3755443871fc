//! Media kinds, transfer items and request expansion.
//!
//! A request resolves once into a sequence of [`MediaItem`]s. Kind-specific
//! metadata travels as typed fields on [`RemoteMedia`], so nothing downstream
//! has to inspect a message to find out what it carries.

use crate::client::ChatClient;
use crate::error::TransmissionError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Kind of media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// GIF or silent video
    Animation,
    /// Music file
    Audio,
    /// Generic file
    Document,
    /// Compressed photo
    Photo,
    /// Sticker
    Sticker,
    /// Video file
    Video,
    /// Round video note
    VideoNote,
    /// Voice recording
    Voice,
}

impl MediaKind {
    /// Lowercase name used when synthesizing file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Sticker => "sticker",
            Self::Video => "video",
            Self::VideoNote => "video_note",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque platform reference to a remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaLocator(String);

impl MediaLocator {
    /// Wrap a platform file reference.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw platform reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media payload of a remote message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    /// What kind of media this is
    pub kind: MediaKind,
    /// Reference used to download the object
    pub locator: MediaLocator,
    /// Declared file name, if the platform provides one
    pub file_name: Option<String>,
    /// When the media was posted
    pub timestamp: Option<DateTime<Utc>>,
    /// Object size in bytes (zero when unknown)
    pub size: u64,
}

/// A message as seen by the transmission core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    /// Chat the message lives in
    pub chat_id: i64,
    /// Message id inside the chat
    pub message_id: i32,
    /// Media group the message belongs to, if any
    pub media_group_id: Option<String>,
    /// Attached media, if any
    pub media: Option<RemoteMedia>,
}

/// Where the bytes of an item come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Remote object to download
    Remote(MediaLocator),
    /// Local file to upload
    Local(PathBuf),
}

/// One unit of transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Identifier of the item (source message id for downloads)
    pub item_id: i32,
    /// Source of the bytes
    pub source: MediaSource,
    /// Resolved, non-empty file name
    pub target_name: String,
    /// Total size in bytes, the progress denominator
    pub size: u64,
}

/// Derive the file name of a media payload.
///
/// Priority: the declared file name, then `{kind}_{timestamp}`, then
/// `{kind}_{now}` when the payload has no timestamp.
#[must_use]
pub fn derive_name(media: &RemoteMedia, now: DateTime<Utc>) -> String {
    if let Some(name) = media.file_name.as_deref().and_then(sanitize_file_name) {
        return name;
    }

    let stamp = media.timestamp.unwrap_or(now);
    format!("{}_{}", media.kind.as_str(), stamp.format(TIMESTAMP_FORMAT))
}

/// Strip path separators from a declared name; `None` if nothing is left.
#[must_use]
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn with_suffix(name: &str, item_id: i32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{item_id}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}_{item_id}"),
    }
}

/// Items produced by [`MediaResolver::resolve`].
///
/// Names are derived as the sequence is consumed; the sequence cannot be
/// restarted.
#[derive(Debug)]
pub struct MediaItems {
    messages: std::vec::IntoIter<RemoteMessage>,
    now: DateTime<Utc>,
    used_names: HashSet<String>,
}

impl MediaItems {
    fn new(messages: Vec<RemoteMessage>, now: DateTime<Utc>) -> Self {
        Self {
            messages: messages.into_iter(),
            now,
            used_names: HashSet::new(),
        }
    }

    /// Number of items not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.messages.len()
    }
}

impl Iterator for MediaItems {
    type Item = MediaItem;

    fn next(&mut self) -> Option<Self::Item> {
        for message in self.messages.by_ref() {
            let Some(media) = message.media else {
                continue;
            };

            let mut target_name = derive_name(&media, self.now);
            if self.used_names.contains(&target_name) {
                target_name = with_suffix(&target_name, message.message_id);
            }
            self.used_names.insert(target_name.clone());

            return Some(MediaItem {
                item_id: message.message_id,
                source: MediaSource::Remote(media.locator),
                target_name,
                size: media.size,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.messages.len()))
    }
}

/// Expands a download request into the media items it targets
#[derive(Clone)]
pub struct MediaResolver {
    client: Arc<dyn ChatClient>,
}

impl MediaResolver {
    /// Create a resolver backed by `client`.
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// Resolve `message` into the items to transfer.
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError::NoMedia`] when neither the message nor its
    /// expanded group carries any media.
    pub async fn resolve(
        &self,
        message: RemoteMessage,
        bulk: bool,
    ) -> Result<MediaItems, TransmissionError> {
        self.resolve_at(message, bulk, Utc::now()).await
    }

    /// Same as [`Self::resolve`] with an explicit clock reading for naming.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_at(
        &self,
        message: RemoteMessage,
        bulk: bool,
        now: DateTime<Utc>,
    ) -> Result<MediaItems, TransmissionError> {
        if bulk {
            if let Some(group) = self.expand_group(&message).await {
                debug!(
                    chat_id = message.chat_id,
                    message_id = message.message_id,
                    items = group.len(),
                    "Expanded media group"
                );
                return Ok(MediaItems::new(group, now));
            }
        }

        if message.media.is_none() {
            return Err(TransmissionError::NoMedia);
        }
        Ok(MediaItems::new(vec![message], now))
    }

    async fn expand_group(&self, message: &RemoteMessage) -> Option<Vec<RemoteMessage>> {
        if message.media_group_id.is_none() {
            debug!(
                message_id = message.message_id,
                "Message is not part of a media group; treating as single item"
            );
            return None;
        }

        match self
            .client
            .fetch_media_group(message.chat_id, message.message_id)
            .await
        {
            Ok(mut group) => {
                group.retain(|m| m.media.is_some());
                if group.is_empty() {
                    return None;
                }
                group.sort_by_key(|m| m.message_id);
                Some(group)
            }
            Err(e) => {
                warn!(
                    message_id = message.message_id,
                    error = %e,
                    "Media group expansion failed; falling back to single item"
                );
                None
            }
        }
    }
}
