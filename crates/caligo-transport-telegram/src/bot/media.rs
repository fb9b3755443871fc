//! Conversion of Telegram messages into core [`RemoteMessage`]s.

use caligo_core::media::MediaLocator;
use caligo_core::{MediaKind, RemoteMedia, RemoteMessage};
use teloxide::types::{FileMeta, Message};

/// Convert a Telegram message, extracting its attached media if any.
#[must_use]
pub fn remote_message(msg: &Message) -> RemoteMessage {
    RemoteMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        media_group_id: msg.media_group_id().map(|id| id.to_string()),
        media: extract_media(msg),
    }
}

fn extract_media(msg: &Message) -> Option<RemoteMedia> {
    let (kind, file, file_name) = if let Some(doc) = msg.document() {
        (MediaKind::Document, &doc.file, doc.file_name.clone())
    } else if let Some(video) = msg.video() {
        (MediaKind::Video, &video.file, video.file_name.clone())
    } else if let Some(audio) = msg.audio() {
        (MediaKind::Audio, &audio.file, audio.file_name.clone())
    } else if let Some(animation) = msg.animation() {
        (MediaKind::Animation, &animation.file, animation.file_name.clone())
    } else if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        // The last size is the largest one.
        (MediaKind::Photo, &photo.file, None)
    } else if let Some(voice) = msg.voice() {
        (MediaKind::Voice, &voice.file, None)
    } else if let Some(note) = msg.video_note() {
        (MediaKind::VideoNote, &note.file, None)
    } else if let Some(sticker) = msg.sticker() {
        (MediaKind::Sticker, &sticker.file, None)
    } else {
        return None;
    };

    Some(media_from_file(kind, file, file_name, msg))
}

fn media_from_file(
    kind: MediaKind,
    file: &FileMeta,
    file_name: Option<String>,
    msg: &Message,
) -> RemoteMedia {
    RemoteMedia {
        kind,
        locator: MediaLocator::new(file.id.0.clone()),
        file_name,
        timestamp: Some(msg.date),
        size: u64::from(file.size),
    }
}
