//! Transfer execution
//!
//! Runs the items of one request one after another. Each item becomes a
//! registered [`TransferTask`] whose operation runs as its own Tokio task;
//! the executor pumps that operation's progress channel through a
//! [`ProgressReporter`] and watches the task's cancellation token.

use crate::registry::{TaskRegistry, TaskStatus, TransferTask};
use caligo_core::client::{ProgressSender, TransferProgress};
use caligo_core::config::TransmissionSettings;
use caligo_core::media::MediaSource;
use caligo_core::{
    ChatClient, ClientError, Direction, ItemFailure, LocalStorage, MediaItem, ProgressReporter,
    ProgressState, RequestId, Responder, TransmissionError, UploadKind,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-request transfer options
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Delete the local source after a successful upload
    pub delete_source: bool,
    /// Caption attached to uploaded files
    pub caption: Option<String>,
}

/// Outcome of one item of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Remote object stored locally
    Downloaded {
        /// Where the object was written
        path: PathBuf,
    },
    /// Local file posted to the chat
    Uploaded {
        /// Uploaded file name
        name: String,
        /// Representation the file was posted as
        kind: UploadKind,
        /// Diagnostic tag if deleting the source failed
        cleanup_failed: Option<&'static str>,
    },
    /// The item failed
    Failed(ItemFailure),
}

impl ItemOutcome {
    /// Whether the item succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// One report line for this outcome.
    #[must_use]
    pub fn line(&self) -> String {
        match self {
            Self::Downloaded { path } => format!(
                "× <code>{}</code>",
                html_escape::encode_text(&path.display().to_string())
            ),
            Self::Uploaded {
                name,
                kind,
                cleanup_failed,
            } => {
                let mut line = format!(
                    "× <code>{}</code> uploaded as {kind}",
                    html_escape::encode_text(name)
                );
                if let Some(tag) = cleanup_failed {
                    line.push_str(&format!(" (source not deleted: {tag})"));
                }
                line
            }
            Self::Failed(failure) => failure.notice(),
        }
    }
}

/// Per-item outcomes of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Direction of the transfer
    pub direction: Direction,
    /// `(item id, outcome)` pairs in processing order
    pub outcomes: Vec<(i32, ItemOutcome)>,
}

impl TransferReport {
    /// Number of successful items.
    #[must_use]
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// One line per item, successes and failures alike.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(|(_, o)| o.line()).collect()
    }

    /// The report as a single HTML message.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }
}

/// Result of a transfer that produced at least one success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    /// Every item succeeded
    Completed(TransferReport),
    /// Some items failed
    PartialFailure(TransferReport),
}

impl TransferResult {
    /// The underlying report.
    #[must_use]
    pub const fn report(&self) -> &TransferReport {
        match self {
            Self::Completed(report) | Self::PartialFailure(report) => report,
        }
    }

    /// The report as a single HTML message.
    #[must_use]
    pub fn render(&self) -> String {
        self.report().render()
    }
}

enum ItemRun {
    Finished(ItemOutcome),
    Failed(ClientError),
    Cancelled,
}

/// An abort that lands after the operation finished still wins.
fn settle(run: ItemRun, token: &CancellationToken) -> ItemRun {
    if token.is_cancelled() {
        ItemRun::Cancelled
    } else {
        run
    }
}

enum OperationOutput {
    Downloaded(PathBuf),
    Uploaded(UploadKind),
}

/// Executes transfers and aggregates their outcomes
#[derive(Clone)]
pub struct TransferExecutor {
    client: Arc<dyn ChatClient>,
    storage: Arc<dyn LocalStorage>,
    registry: Arc<TaskRegistry>,
    progress_interval: Duration,
    channel_capacity: usize,
}

impl TransferExecutor {
    /// Create an executor with default settings.
    #[must_use]
    pub fn new(
        client: Arc<dyn ChatClient>,
        storage: Arc<dyn LocalStorage>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self::with_settings(client, storage, registry, &TransmissionSettings::default())
    }

    /// Create an executor honoring `settings`.
    #[must_use]
    pub fn with_settings(
        client: Arc<dyn ChatClient>,
        storage: Arc<dyn LocalStorage>,
        registry: Arc<TaskRegistry>,
        settings: &TransmissionSettings,
    ) -> Self {
        Self {
            client,
            storage,
            registry,
            progress_interval: settings.progress_interval(),
            channel_capacity: settings.progress_channel_capacity(),
        }
    }

    /// Run every item of a request and aggregate the outcomes.
    ///
    /// Items run one at a time. A failed item is recorded and the next one
    /// starts; a cancelled item aborts the remainder. The request stays open
    /// in the registry for the whole run, so an abort between two items
    /// stops the batch before the next one starts.
    ///
    /// # Errors
    ///
    /// - [`TransmissionError::Aborted`] if any item was cancelled.
    /// - [`TransmissionError::AllFailed`] if no item succeeded.
    /// - [`TransmissionError::NoMedia`] if `items` is empty.
    pub async fn execute<I>(
        &self,
        request_id: RequestId,
        direction: Direction,
        items: I,
        sink: Arc<dyn Responder>,
        options: &TransferOptions,
    ) -> Result<TransferResult, TransmissionError>
    where
        I: IntoIterator<Item = MediaItem>,
    {
        let request_token = self.registry.open_request(request_id).await;
        let result = self
            .run_items(request_id, direction, items, &request_token, sink, options)
            .await;
        self.registry.close_request(request_id).await;
        result
    }

    async fn run_items<I>(
        &self,
        request_id: RequestId,
        direction: Direction,
        items: I,
        request_token: &CancellationToken,
        sink: Arc<dyn Responder>,
        options: &TransferOptions,
    ) -> Result<TransferResult, TransmissionError>
    where
        I: IntoIterator<Item = MediaItem>,
    {
        let mut outcomes = Vec::new();

        for item in items {
            if request_token.is_cancelled() {
                info!(request_id = %request_id, item_id = item.item_id, "Request cancelled before item started");
                return Err(TransmissionError::Aborted);
            }

            info!(
                request_id = %request_id,
                direction = %direction,
                item_id = item.item_id,
                file_name = %item.target_name,
                size = item.size,
                "Transfer started"
            );

            match self
                .run_item(request_id, direction, &item, request_token, sink.as_ref(), options)
                .await
            {
                ItemRun::Finished(outcome) => {
                    info!(request_id = %request_id, item_id = item.item_id, "Transfer completed");
                    outcomes.push((item.item_id, outcome));
                }
                ItemRun::Failed(e) => {
                    warn!(
                        request_id = %request_id,
                        item_id = item.item_id,
                        error = %e,
                        "Transfer failed"
                    );
                    outcomes.push((
                        item.item_id,
                        ItemOutcome::Failed(ItemFailure {
                            item_id: item.item_id,
                            name: item.target_name.clone(),
                            tag: e.tag(),
                        }),
                    ));
                }
                ItemRun::Cancelled => {
                    info!(request_id = %request_id, item_id = item.item_id, "Transfer cancelled");
                    return Err(TransmissionError::Aborted);
                }
            }
        }

        if outcomes.is_empty() {
            return Err(TransmissionError::NoMedia);
        }

        let report = TransferReport {
            direction,
            outcomes,
        };

        match (report.successes(), report.failures()) {
            (0, _) => Err(TransmissionError::AllFailed {
                direction,
                failures: report
                    .outcomes
                    .into_iter()
                    .filter_map(|(_, outcome)| match outcome {
                        ItemOutcome::Failed(failure) => Some(failure),
                        _ => None,
                    })
                    .collect(),
            }),
            (_, 0) => Ok(TransferResult::Completed(report)),
            _ => Ok(TransferResult::PartialFailure(report)),
        }
    }

    async fn run_item(
        &self,
        request_id: RequestId,
        direction: Direction,
        item: &MediaItem,
        request_token: &CancellationToken,
        sink: &dyn Responder,
        options: &TransferOptions,
    ) -> ItemRun {
        let mut task = TransferTask::child_of(request_id, direction, request_token);
        let token = task.cancellation_token().clone();
        self.registry.register(task.clone()).await;

        let (tx, mut rx) = mpsc::channel::<TransferProgress>(self.channel_capacity);
        let mut operation = self.spawn_operation(request_id.chat_id(), item, tx, options);

        let reporter = ProgressReporter::new(direction, item.target_name.clone())
            .with_interval(self.progress_interval);
        let mut state = ProgressState::new(item.size);

        let run = loop {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    operation.abort();
                    break ItemRun::Cancelled;
                }
                // Buffered ticks are drained before completion is observed.
                Some(tick) = rx.recv() => {
                    if let Some(update) = reporter.on_progress(tick.current, tick.total, &mut state) {
                        if let Err(e) = sink.edit_or_throttle_respond(&update.text).await {
                            debug!(request_id = %request_id, error = %e, "Progress update failed");
                        }
                    }
                }
                joined = &mut operation => {
                    break match joined {
                        Ok(Ok(output)) => ItemRun::Finished(self.outcome(item, output)),
                        Ok(Err(e)) => ItemRun::Failed(e),
                        Err(e) if e.is_cancelled() => ItemRun::Cancelled,
                        Err(e) => ItemRun::Failed(ClientError::Internal(e.to_string())),
                    };
                }
            }
        };

        let run = settle(run, &token);

        self.registry.unregister(request_id, task.id()).await;
        task.finish(match run {
            ItemRun::Finished(_) => TaskStatus::Completed,
            ItemRun::Failed(_) => TaskStatus::Failed,
            ItemRun::Cancelled => TaskStatus::Cancelled,
        });
        debug!(
            request_id = %request_id,
            task_id = %task.id(),
            status = ?task.status(),
            "Task finished"
        );

        match run {
            ItemRun::Finished(outcome) => {
                ItemRun::Finished(self.cleanup_source(item, outcome, options).await)
            }
            other => other,
        }
    }

    fn spawn_operation(
        &self,
        chat_id: i64,
        item: &MediaItem,
        progress: ProgressSender,
        options: &TransferOptions,
    ) -> JoinHandle<Result<OperationOutput, ClientError>> {
        let client = Arc::clone(&self.client);

        match &item.source {
            MediaSource::Remote(locator) => {
                let locator = locator.clone();
                let destination = self.storage.download_path(&item.target_name);
                tokio::spawn(async move {
                    client
                        .download_object(&locator, &destination, progress)
                        .await
                        .map(OperationOutput::Downloaded)
                })
            }
            MediaSource::Local(path) => {
                let path = path.clone();
                let kind = UploadKind::from_path(&path);
                let caption = options.caption.clone();
                tokio::spawn(async move {
                    client
                        .upload_object(chat_id, kind, &path, caption, progress)
                        .await
                        .map(|_| OperationOutput::Uploaded(kind))
                })
            }
        }
    }

    fn outcome(&self, item: &MediaItem, output: OperationOutput) -> ItemOutcome {
        match output {
            OperationOutput::Downloaded(path) => ItemOutcome::Downloaded { path },
            OperationOutput::Uploaded(kind) => ItemOutcome::Uploaded {
                name: item.target_name.clone(),
                kind,
                cleanup_failed: None,
            },
        }
    }

    async fn cleanup_source(
        &self,
        item: &MediaItem,
        outcome: ItemOutcome,
        options: &TransferOptions,
    ) -> ItemOutcome {
        let (MediaSource::Local(path), true) = (&item.source, options.delete_source) else {
            return outcome;
        };
        let ItemOutcome::Uploaded { name, kind, .. } = outcome else {
            return outcome;
        };

        let cleanup_failed = match self.storage.remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Source removed after upload");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove source after upload");
                Some(e.tag())
            }
        };

        ItemOutcome::Uploaded {
            name,
            kind,
            cleanup_failed,
        }
    }
}
