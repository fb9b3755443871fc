//! Transmission manager
//!
//! Entry points a command handler calls: start a download, start an upload,
//! abort whatever a request started.

use crate::executor::{TransferExecutor, TransferOptions, TransferResult};
use crate::registry::TaskRegistry;
use caligo_core::config::TransmissionSettings;
use caligo_core::media::MediaSource;
use caligo_core::{
    ChatClient, Direction, LocalStorage, MediaItem, MediaResolver, MessageRef, RemoteMessage,
    RequestId, Responder, TransmissionError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a download request points at
#[derive(Debug, Clone)]
pub enum DownloadTarget {
    /// A message the caller already holds
    Message(RemoteMessage),
    /// A link to a message that has to be fetched first
    Link(MessageRef),
}

/// Download request
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Request identity, used by abort
    pub id: RequestId,
    /// Message or link holding the media
    pub target: DownloadTarget,
    /// Expand the whole media group of the target
    pub bulk: bool,
}

/// Upload request
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Request identity, used by abort
    pub id: RequestId,
    /// Local file to post
    pub path: PathBuf,
    /// Delete the file after a successful upload
    pub delete_after: bool,
    /// Optional caption for the posted file
    pub caption: Option<String>,
}

/// Result of an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortResult {
    /// Request whose tasks were cancelled
    pub request_id: RequestId,
    /// Number of tasks signalled
    pub cancelled: usize,
}

/// Coordinates resolution, execution and cancellation of transfers
#[derive(Clone)]
pub struct TransmissionManager {
    client: Arc<dyn ChatClient>,
    storage: Arc<dyn LocalStorage>,
    registry: Arc<TaskRegistry>,
    resolver: MediaResolver,
    executor: TransferExecutor,
}

impl TransmissionManager {
    /// Create a manager over the given collaborators.
    #[must_use]
    pub fn new(
        client: Arc<dyn ChatClient>,
        storage: Arc<dyn LocalStorage>,
        settings: &TransmissionSettings,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let executor = TransferExecutor::with_settings(
            Arc::clone(&client),
            Arc::clone(&storage),
            Arc::clone(&registry),
            settings,
        );

        Self {
            resolver: MediaResolver::new(Arc::clone(&client)),
            client,
            storage,
            registry,
            executor,
        }
    }

    /// Registry of running tasks.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Download the media a request points at.
    ///
    /// # Errors
    ///
    /// - [`TransmissionError::InvalidTarget`] if a link cannot be fetched.
    /// - [`TransmissionError::NoMedia`] if the target carries no media.
    /// - Any error of [`TransferExecutor::execute`].
    pub async fn start_download(
        &self,
        request: DownloadRequest,
        sink: Arc<dyn Responder>,
    ) -> Result<TransferResult, TransmissionError> {
        let message = match request.target {
            DownloadTarget::Message(message) => message,
            DownloadTarget::Link(link) => self
                .client
                .fetch_message(&link.chat, link.message_id)
                .await
                .map_err(|e| {
                    warn!(request_id = %request.id, link = %link, error = %e, "Failed to fetch linked message");
                    TransmissionError::InvalidTarget(link.to_string())
                })?,
        };

        let items = self.resolver.resolve(message, request.bulk).await?;
        info!(
            request_id = %request.id,
            bulk = request.bulk,
            items = items.remaining(),
            "Download resolved"
        );

        self.executor
            .execute(
                request.id,
                Direction::Download,
                items,
                sink,
                &TransferOptions::default(),
            )
            .await
    }

    /// Upload a local file to the requester's chat.
    ///
    /// The path is checked before anything is registered or sent.
    ///
    /// # Errors
    ///
    /// - [`TransmissionError::InvalidTarget`] if the path is not a readable file.
    /// - Any error of [`TransferExecutor::execute`].
    pub async fn start_upload(
        &self,
        request: UploadRequest,
        sink: Arc<dyn Responder>,
    ) -> Result<TransferResult, TransmissionError> {
        let invalid = || TransmissionError::InvalidTarget(request.path.display().to_string());

        if !self.storage.is_file(&request.path).await {
            warn!(request_id = %request.id, path = %request.path.display(), "Upload path is not a file");
            return Err(invalid());
        }

        let size = self.storage.file_size(&request.path).await.map_err(|e| {
            warn!(request_id = %request.id, path = %request.path.display(), error = %e, "Failed to stat upload path");
            invalid()
        })?;

        let target_name = request
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?;

        let item = MediaItem {
            item_id: request.id.message_id(),
            source: MediaSource::Local(request.path.clone()),
            target_name,
            size,
        };
        let options = TransferOptions {
            delete_source: request.delete_after,
            caption: request.caption.clone(),
        };

        self.executor
            .execute(request.id, Direction::Upload, [item], sink, &options)
            .await
    }

    /// Cancel every running task of `request_id`.
    ///
    /// Returns once cancellation is signalled; the transfer's own result
    /// reports [`TransmissionError::Aborted`] when it observes it.
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError::NotFound`] if nothing is running for the
    /// request.
    pub async fn abort(&self, request_id: RequestId) -> Result<AbortResult, TransmissionError> {
        let cancelled = self.registry.cancel_request(request_id).await?;
        Ok(AbortResult {
            request_id,
            cancelled: cancelled.len(),
        })
    }
}
