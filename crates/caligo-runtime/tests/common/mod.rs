//! Hand-written collaborators for runtime scenario tests.

#![allow(dead_code)]

use async_trait::async_trait;
use caligo_core::client::{ProgressSender, RemoteHandle, TransferProgress};
use caligo_core::media::MediaLocator;
use caligo_core::{
    ChatClient, ChatRef, ClientError, LocalStorage, MediaKind, RemoteMedia, RemoteMessage,
    Responder, UploadKind,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const CHAT_ID: i64 = 7;

/// How a fake download behaves
#[derive(Clone)]
pub enum DownloadBehavior {
    /// Report full progress and succeed
    Succeed,
    /// Fail with a network error
    Fail,
    /// Report one tick, then never finish
    Hang,
    /// Signal `started`, take this long, then succeed
    Delay(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    pub chat_id: i64,
    pub kind: UploadKind,
    pub path: PathBuf,
    pub caption: Option<String>,
}

#[derive(Default)]
pub struct FakeClient {
    messages: Mutex<HashMap<i32, RemoteMessage>>,
    group: Mutex<Vec<RemoteMessage>>,
    downloads: Mutex<HashMap<String, DownloadBehavior>>,
    pub uploads: Mutex<Vec<UploadCall>>,
    attempted: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub started: Notify,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_message(self: &Arc<Self>, message: RemoteMessage) {
        lock(&self.messages).insert(message.message_id, message);
    }

    pub fn with_group(self: &Arc<Self>, group: Vec<RemoteMessage>) {
        *lock(&self.group) = group;
    }

    pub fn with_download(self: &Arc<Self>, locator: &str, behavior: DownloadBehavior) {
        lock(&self.downloads).insert(locator.to_string(), behavior);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Locators of every download started so far, in order.
    pub fn attempted(&self) -> Vec<String> {
        lock(&self.attempted).clone()
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn fetch_message(
        &self,
        _chat: &ChatRef,
        message_id: i32,
    ) -> Result<RemoteMessage, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.messages)
            .get(&message_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("message {message_id}")))
    }

    async fn fetch_media_group(
        &self,
        _chat_id: i64,
        _message_id: i32,
    ) -> Result<Vec<RemoteMessage>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.group).clone())
    }

    async fn download_object(
        &self,
        locator: &MediaLocator,
        destination: &Path,
        progress: ProgressSender,
    ) -> Result<PathBuf, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.attempted).push(locator.as_str().to_string());
        let behavior = lock(&self.downloads)
            .get(locator.as_str())
            .cloned()
            .unwrap_or(DownloadBehavior::Succeed);

        match behavior {
            DownloadBehavior::Succeed => {
                let _ = progress
                    .send(TransferProgress {
                        current: 1024,
                        total: 1024,
                    })
                    .await;
                Ok(destination.to_path_buf())
            }
            DownloadBehavior::Fail => Err(ClientError::Network("connection reset".to_string())),
            DownloadBehavior::Hang => {
                let _ = progress
                    .send(TransferProgress {
                        current: 10,
                        total: 1024,
                    })
                    .await;
                self.started.notify_one();
                std::future::pending().await
            }
            DownloadBehavior::Delay(delay) => {
                self.started.notify_one();
                tokio::time::sleep(delay).await;
                Ok(destination.to_path_buf())
            }
        }
    }

    async fn upload_object(
        &self,
        chat_id: i64,
        kind: UploadKind,
        path: &Path,
        caption: Option<String>,
        progress: ProgressSender,
    ) -> Result<RemoteHandle, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = progress.send(TransferProgress { current: 0, total: 1 }).await;
        lock(&self.uploads).push(UploadCall {
            chat_id,
            kind,
            path: path.to_path_buf(),
            caption,
        });
        Ok(RemoteHandle {
            chat_id,
            message_id: 9000,
        })
    }
}

#[derive(Default)]
pub struct FakeStorage {
    files: Mutex<HashMap<PathBuf, u64>>,
    pub removed: Mutex<HashSet<PathBuf>>,
    pub fail_removal: bool,
}

impl FakeStorage {
    pub fn with_file(path: &str, size: u64) -> Self {
        let storage = Self::default();
        lock(&storage.files).insert(PathBuf::from(path), size);
        storage
    }

    pub fn was_removed(&self, path: &str) -> bool {
        lock(&self.removed).contains(Path::new(path))
    }
}

#[async_trait]
impl LocalStorage for FakeStorage {
    async fn is_file(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    async fn file_size(&self, path: &Path) -> Result<u64, ClientError> {
        lock(&self.files)
            .get(path)
            .copied()
            .ok_or_else(|| ClientError::NotFound(path.display().to_string()))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), ClientError> {
        if self.fail_removal {
            return Err(ClientError::Storage(std::io::Error::other("read-only")));
        }
        lock(&self.files).remove(path);
        lock(&self.removed).insert(path.to_path_buf());
        Ok(())
    }

    fn download_path(&self, name: &str) -> PathBuf {
        Path::new("/downloads").join(name)
    }
}

#[derive(Default)]
pub struct RecordingResponder {
    pub edits: Mutex<Vec<String>>,
}

impl RecordingResponder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn edits(&self) -> Vec<String> {
        lock(&self.edits).clone()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn respond(&self, text: &str) -> Result<RemoteHandle, ClientError> {
        lock(&self.edits).push(text.to_string());
        Ok(RemoteHandle {
            chat_id: CHAT_ID,
            message_id: 1,
        })
    }

    async fn edit_or_throttle_respond(&self, text: &str) -> Result<(), ClientError> {
        lock(&self.edits).push(text.to_string());
        Ok(())
    }
}

pub fn media_message(message_id: i32, group: Option<&str>, name: &str) -> RemoteMessage {
    RemoteMessage {
        chat_id: CHAT_ID,
        message_id,
        media_group_id: group.map(ToString::to_string),
        media: Some(RemoteMedia {
            kind: MediaKind::Document,
            locator: MediaLocator::new(format!("doc-{message_id}")),
            file_name: Some(name.to_string()),
            timestamp: None,
            size: 1024,
        }),
    }
}

pub fn text_message(message_id: i32) -> RemoteMessage {
    RemoteMessage {
        chat_id: CHAT_ID,
        message_id,
        media_group_id: None,
        media: None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
