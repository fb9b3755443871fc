//! [`ChatClient`] over the Telegram Bot API.

use crate::bot::message_cache::MessageCache;
use crate::bot::resilient::retry_telegram_operation;
use async_trait::async_trait;
use caligo_core::client::{ProgressSender, RemoteHandle, TransferProgress};
use caligo_core::media::MediaLocator;
use caligo_core::{ChatClient, ChatRef, ClientError, RemoteMessage, UploadKind};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};
use teloxide::RequestError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Chat client backed by a teloxide [`Bot`] and the observed message cache
#[derive(Clone)]
pub struct TelegramChatClient {
    bot: Bot,
    cache: Arc<MessageCache>,
}

impl TelegramChatClient {
    /// Create a client over `bot`, resolving history through `cache`.
    #[must_use]
    pub fn new(bot: Bot, cache: Arc<MessageCache>) -> Self {
        Self { bot, cache }
    }
}

fn map_request_error(e: RequestError) -> ClientError {
    match e {
        RequestError::Api(api) => ClientError::Rejected(api.to_string()),
        other => ClientError::Network(other.to_string()),
    }
}

#[async_trait]
impl ChatClient for TelegramChatClient {
    async fn fetch_message(
        &self,
        chat: &ChatRef,
        message_id: i32,
    ) -> Result<RemoteMessage, ClientError> {
        let chat_id = self
            .cache
            .resolve_chat(chat)
            .await
            .ok_or_else(|| ClientError::NotFound(format!("chat {chat}")))?;

        self.cache
            .message(chat_id, message_id)
            .await
            .ok_or_else(|| ClientError::NotFound(format!("message {chat}/{message_id}")))
    }

    async fn fetch_media_group(
        &self,
        chat_id: i64,
        message_id: i32,
    ) -> Result<Vec<RemoteMessage>, ClientError> {
        self.cache
            .media_group(chat_id, message_id)
            .await
            .ok_or_else(|| {
                ClientError::Unsupported(format!(
                    "media group of unobserved message {chat_id}/{message_id}"
                ))
            })
    }

    async fn download_object(
        &self,
        locator: &MediaLocator,
        destination: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, ClientError> {
        let file_id = FileId(locator.as_str().to_string());
        let file = retry_telegram_operation(|| async {
            self.bot
                .get_file(file_id.clone())
                .await
                .map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| match e.downcast::<RequestError>() {
            Ok(request) => map_request_error(request),
            Err(other) => ClientError::Network(other.to_string()),
        })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut output = tokio::fs::File::create(destination).await?;

        let total = u64::from(file.size);
        let mut current = 0u64;
        let mut stream = self.bot.download_file_stream(&file.path);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(e.to_string()))?;
            output.write_all(&chunk).await?;
            current += chunk.len() as u64;
            // The receiver is gone once the transfer is cancelled.
            let _ = progress.send(TransferProgress { current, total }).await;
        }
        output.flush().await?;

        debug!(path = %destination.display(), bytes = current, "Download written");
        Ok(destination.to_path_buf())
    }

    async fn upload_object(
        &self,
        chat_id: i64,
        kind: UploadKind,
        path: &Path,
        caption: Option<String>,
        progress: ProgressSender,
    ) -> Result<RemoteHandle, ClientError> {
        let total = tokio::fs::metadata(path).await?.len();
        // The Bot API reports no partial progress for multipart uploads.
        let _ = progress.send(TransferProgress { current: 0, total }).await;

        let chat = ChatId(chat_id);
        let input = InputFile::file(path);
        let sent = match (kind, caption) {
            (UploadKind::Video, Some(c)) => self.bot.send_video(chat, input).caption(c).await,
            (UploadKind::Video, None) => self.bot.send_video(chat, input).await,
            (UploadKind::Audio, Some(c)) => self.bot.send_audio(chat, input).caption(c).await,
            (UploadKind::Audio, None) => self.bot.send_audio(chat, input).await,
            (UploadKind::Image, Some(c)) => self.bot.send_photo(chat, input).caption(c).await,
            (UploadKind::Image, None) => self.bot.send_photo(chat, input).await,
            (UploadKind::Document, Some(c)) => {
                self.bot.send_document(chat, input).caption(c).await
            }
            (UploadKind::Document, None) => self.bot.send_document(chat, input).await,
        }
        .map_err(map_request_error)?;

        let _ = progress
            .send(TransferProgress {
                current: total,
                total,
            })
            .await;

        info!(
            chat_id,
            message_id = sent.id.0,
            kind = %kind,
            path = %path.display(),
            "File uploaded"
        );
        Ok(RemoteHandle {
            chat_id,
            message_id: sent.id.0,
        })
    }
}
