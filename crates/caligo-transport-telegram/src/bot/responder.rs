//! Status-message [`Responder`].
//!
//! Each request gets one status message. The first response posts it, later
//! responses edit it in place; if an edit fails a fresh message is posted.

use crate::bot::message_cache::MessageCache;
use crate::bot::resilient::{edit_message_safe_resilient, fit_message, send_message_resilient};
use async_trait::async_trait;
use caligo_core::client::RemoteHandle;
use caligo_core::{ClientError, RequestId, Responder};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tokio::sync::Mutex;
use tracing::debug;

/// Responder that keeps a request's status message up to date
pub struct TelegramResponder {
    bot: Bot,
    request_id: RequestId,
    cache: Arc<MessageCache>,
    status: Mutex<Option<MessageId>>,
}

impl TelegramResponder {
    /// Create a responder for `request_id`; nothing is posted yet.
    #[must_use]
    pub fn new(bot: Bot, request_id: RequestId, cache: Arc<MessageCache>) -> Self {
        Self {
            bot,
            request_id,
            cache,
            status: Mutex::new(None),
        }
    }

    fn chat_id(&self) -> ChatId {
        ChatId(self.request_id.chat_id())
    }

    fn handle(&self, id: MessageId) -> RemoteHandle {
        RemoteHandle {
            chat_id: self.request_id.chat_id(),
            message_id: id.0,
        }
    }
}

#[async_trait]
impl Responder for TelegramResponder {
    async fn respond(&self, text: &str) -> Result<RemoteHandle, ClientError> {
        let mut status = self.status.lock().await;
        if let Some(id) = *status {
            if edit_message_safe_resilient(&self.bot, self.chat_id(), id, text).await {
                return Ok(self.handle(id));
            }
            debug!(request_id = %self.request_id, "Status edit failed, posting a new message");
        }

        let sent = send_message_resilient(
            &self.bot,
            self.chat_id(),
            fit_message(text),
            Some(ParseMode::Html),
        )
        .await
        .map_err(|e| ClientError::Network(e.to_string()))?;

        *status = Some(sent.id);
        self.cache
            .alias_status(self.request_id.chat_id(), sent.id.0, self.request_id.message_id())
            .await;
        Ok(self.handle(sent.id))
    }

    async fn edit_or_throttle_respond(&self, text: &str) -> Result<(), ClientError> {
        let current = *self.status.lock().await;
        match current {
            Some(id) => {
                if edit_message_safe_resilient(&self.bot, self.chat_id(), id, text).await {
                    Ok(())
                } else {
                    Err(ClientError::Rejected("status message edit failed".to_string()))
                }
            }
            None => self.respond(text).await.map(|_| ()),
        }
    }
}
