//! Collaborator contracts consumed by the transmission manager.
//!
//! The chat platform, the requester's reply channel and the local filesystem
//! are all reached through these traits, so the core never depends on a
//! concrete transport.

use crate::error::ClientError;
use crate::media::{MediaLocator, RemoteMessage};
use crate::request::ChatRef;
use crate::routing::UploadKind;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Raw byte counters reported by a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes moved so far
    pub current: u64,
    /// Expected total in bytes
    pub total: u64,
}

/// Channel a transfer operation reports its byte counters through.
pub type ProgressSender = mpsc::Sender<TransferProgress>;

/// Handle to an object created on the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteHandle {
    /// Chat the object was posted to
    pub chat_id: i64,
    /// Message id of the posted object
    pub message_id: i32,
}

/// Chat platform operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch a single message by chat and message id.
    async fn fetch_message(
        &self,
        chat: &ChatRef,
        message_id: i32,
    ) -> Result<RemoteMessage, ClientError>;

    /// Fetch every message in the media group containing `message_id`.
    async fn fetch_media_group(
        &self,
        chat_id: i64,
        message_id: i32,
    ) -> Result<Vec<RemoteMessage>, ClientError>;

    /// Download a remote object to `destination`, reporting progress.
    async fn download_object(
        &self,
        locator: &MediaLocator,
        destination: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, ClientError>;

    /// Upload a local file to `chat_id` using the given representation.
    async fn upload_object(
        &self,
        chat_id: i64,
        kind: UploadKind,
        path: &Path,
        caption: Option<String>,
        progress: ProgressSender,
    ) -> Result<RemoteHandle, ClientError>;
}

/// Reply channel back to the requester
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    /// Post or replace the request's status message.
    async fn respond(&self, text: &str) -> Result<RemoteHandle, ClientError>;

    /// Edit the status message with a progress update.
    ///
    /// Called only for updates that already passed the progress gate.
    async fn edit_or_throttle_respond(&self, text: &str) -> Result<(), ClientError>;
}

/// Local filesystem operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalStorage: Send + Sync {
    /// Whether `path` exists and is a regular file.
    async fn is_file(&self, path: &Path) -> bool;

    /// Size of the file at `path` in bytes.
    async fn file_size(&self, path: &Path) -> Result<u64, ClientError>;

    /// Delete the file at `path`.
    async fn remove_file(&self, path: &Path) -> Result<(), ClientError>;

    /// Destination path for a downloaded object named `name`.
    fn download_path(&self, name: &str) -> PathBuf;
}

/// [`LocalStorage`] backed by `tokio::fs`
#[derive(Debug, Clone)]
pub struct FsStorage {
    download_dir: PathBuf,
}

impl FsStorage {
    /// Create a storage rooted at `download_dir`.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }
}

#[async_trait]
impl LocalStorage for FsStorage {
    async fn is_file(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn file_size(&self, path: &Path) -> Result<u64, ClientError> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), ClientError> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    fn download_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(name)
    }
}
