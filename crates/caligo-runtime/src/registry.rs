//! Transfer task registry
//!
//! Tracks running transfers by the request that started them and offers
//! lookup-and-cancel for the abort path. Only running tasks are ever stored:
//! whoever observes a task terminate removes it in the same step.
//!
//! A request that is still executing stays open between its items, so an
//! abort landing after one item finished and before the next registered
//! still reaches it through the request token.

use caligo_core::{Direction, RequestId, TransmissionError};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier of one transfer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh task id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Transfer in progress
    Running,
    /// Transfer finished successfully
    Completed,
    /// Transfer failed with an error
    Failed,
    /// Transfer was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Whether the status is terminal (absorbing).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Runtime unit of one transfer.
///
/// The task owns the cancellation token of its underlying operation; the
/// executor aborts the operation as soon as the token fires.
#[derive(Debug, Clone)]
pub struct TransferTask {
    id: TaskId,
    request_id: RequestId,
    direction: Direction,
    token: CancellationToken,
    status: TaskStatus,
}

impl TransferTask {
    /// Create a running task for `request_id`.
    #[must_use]
    pub fn new(request_id: RequestId, direction: Direction) -> Self {
        Self {
            id: TaskId::new(),
            request_id,
            direction,
            token: CancellationToken::new(),
            status: TaskStatus::Running,
        }
    }

    /// Create a running task whose token is a child of `parent`.
    ///
    /// Cancelling `parent` cancels the task; cancelling the task leaves
    /// `parent` untouched.
    #[must_use]
    pub fn child_of(
        request_id: RequestId,
        direction: Direction,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            token: parent.child_token(),
            ..Self::new(request_id, direction)
        }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Request the task belongs to.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Transfer direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Token that stops the underlying operation when cancelled.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Signal cancellation to the underlying operation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Move to a terminal status. Terminal statuses are absorbing.
    pub fn finish(&mut self, status: TaskStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }
}

#[derive(Default)]
struct RequestEntry {
    token: CancellationToken,
    open: bool,
    tasks: HashMap<TaskId, TransferTask>,
}

impl RequestEntry {
    fn is_idle(&self) -> bool {
        !self.open && self.tasks.is_empty()
    }
}

/// Shared registry of running transfer tasks, keyed by request
#[derive(Default)]
pub struct TaskRegistry {
    requests: RwLock<HashMap<RequestId, RequestEntry>>,
}

impl TaskRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `request_id` as executing and return its request token.
    ///
    /// The request stays reachable by [`Self::cancel_request`] until
    /// [`Self::close_request`], even while none of its tasks is registered.
    pub async fn open_request(&self, request_id: RequestId) -> CancellationToken {
        let mut requests = self.requests.write().await;
        let entry = requests.entry(request_id).or_default();
        entry.open = true;
        debug!(request_id = %request_id, "Request opened");
        entry.token.clone()
    }

    /// Mark `request_id` as done. Closing an absent request is a no-op.
    pub async fn close_request(&self, request_id: RequestId) {
        let mut requests = self.requests.write().await;
        if let Some(entry) = requests.get_mut(&request_id) {
            entry.open = false;
            if entry.is_idle() {
                requests.remove(&request_id);
            }
            debug!(request_id = %request_id, "Request closed");
        }
    }

    /// Add a running task under its request.
    ///
    /// Registering the same task twice keeps the first entry. Returns `true`
    /// if the task was inserted.
    pub async fn register(&self, task: TransferTask) -> bool {
        if task.status().is_terminal() {
            warn!(task_id = %task.id(), status = ?task.status(), "Refusing to register finished task");
            return false;
        }

        let request_id = task.request_id();
        let task_id = task.id();
        let mut requests = self.requests.write().await;
        let entry = requests.entry(request_id).or_default();
        if entry.tasks.contains_key(&task_id) {
            return false;
        }
        entry.tasks.insert(task_id, task);
        debug!(request_id = %request_id, task_id = %task_id, "Task registered");
        true
    }

    /// Remove a task. Removing an absent task is a no-op.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn unregister(&self, request_id: RequestId, task_id: TaskId) -> bool {
        let mut requests = self.requests.write().await;
        let removed = remove_entry(&mut requests, request_id, task_id).is_some();
        if removed {
            debug!(request_id = %request_id, task_id = %task_id, "Task unregistered");
        }
        removed
    }

    /// All running tasks started by `request_id`.
    pub async fn find_by_request(&self, request_id: RequestId) -> Vec<TransferTask> {
        let requests = self.requests.read().await;
        requests
            .get(&request_id)
            .map(|entry| entry.tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Signal cancellation on one task, then unregister it.
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError::NotFound`] if no such task is registered;
    /// the registry is left unchanged in that case.
    pub async fn cancel(
        &self,
        request_id: RequestId,
        task_id: TaskId,
    ) -> Result<TransferTask, TransmissionError> {
        let mut requests = self.requests.write().await;
        let Some(task) = requests
            .get(&request_id)
            .and_then(|entry| entry.tasks.get(&task_id))
        else {
            warn!(request_id = %request_id, task_id = %task_id, "No running task to cancel");
            return Err(TransmissionError::NotFound(request_id));
        };

        task.cancel();
        let mut task = remove_entry(&mut requests, request_id, task_id)
            .ok_or(TransmissionError::NotFound(request_id))?;
        task.finish(TaskStatus::Cancelled);
        info!(request_id = %request_id, task_id = %task_id, "Cancellation requested for task");
        Ok(task)
    }

    /// Cancel `request_id`: fire its request token and every task it holds.
    ///
    /// An open request with no task registered at this moment is still
    /// cancelled; the returned list is then empty.
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError::NotFound`] if the request is neither open
    /// nor has a running task.
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
    ) -> Result<Vec<TransferTask>, TransmissionError> {
        let mut requests = self.requests.write().await;
        let Some(entry) = requests.remove(&request_id) else {
            warn!(request_id = %request_id, "No running task for request");
            return Err(TransmissionError::NotFound(request_id));
        };

        entry.token.cancel();
        let cancelled: Vec<_> = entry
            .tasks
            .into_values()
            .map(|mut task| {
                task.cancel();
                task.finish(TaskStatus::Cancelled);
                task
            })
            .collect();
        info!(request_id = %request_id, tasks = cancelled.len(), "Cancellation requested for request");
        Ok(cancelled)
    }

    /// Check if `request_id` is open or has a running task
    pub async fn contains(&self, request_id: RequestId) -> bool {
        let requests = self.requests.read().await;
        requests.contains_key(&request_id)
    }

    /// Get the number of running tasks
    pub async fn len(&self) -> usize {
        let requests = self.requests.read().await;
        requests.values().map(|entry| entry.tasks.len()).sum()
    }

    /// Check if no request is open and no task is running
    pub async fn is_empty(&self) -> bool {
        let requests = self.requests.read().await;
        requests.is_empty()
    }
}

fn remove_entry(
    requests: &mut HashMap<RequestId, RequestEntry>,
    request_id: RequestId,
    task_id: TaskId,
) -> Option<TransferTask> {
    let entry = requests.get_mut(&request_id)?;
    let task = entry.tasks.remove(&task_id);
    if entry.is_idle() {
        requests.remove(&request_id);
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: i32) -> RequestId {
        RequestId::new(42, id)
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = TaskRegistry::new();
        let task = TransferTask::new(request(1), Direction::Download);

        assert!(registry.register(task.clone()).await);
        assert!(!registry.register(task.clone()).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.find_by_request(request(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn finished_tasks_are_not_registered() {
        let registry = TaskRegistry::new();
        let mut task = TransferTask::new(request(1), Direction::Upload);
        task.finish(TaskStatus::Completed);

        assert!(!registry.register(task).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn unregister_twice_is_noop() {
        let registry = TaskRegistry::new();
        let task = TransferTask::new(request(1), Direction::Download);
        registry.register(task.clone()).await;

        assert!(registry.unregister(request(1), task.id()).await);
        assert!(!registry.unregister(request(1), task.id()).await);
        assert!(!registry.contains(request(1)).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn cancel_unknown_leaves_registry_unchanged() {
        let registry = TaskRegistry::new();
        let other = TransferTask::new(request(2), Direction::Download);
        registry.register(other.clone()).await;

        let result = registry.cancel(request(1), TaskId::new()).await;
        assert!(matches!(result, Err(TransmissionError::NotFound(id)) if id == request(1)));

        let wrong_task = registry.cancel(request(2), TaskId::new()).await;
        assert!(matches!(wrong_task, Err(TransmissionError::NotFound(_))));

        assert_eq!(registry.len().await, 1);
        assert!(!other.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn cancel_removes_only_that_task() {
        let registry = TaskRegistry::new();
        let target = TransferTask::new(request(1), Direction::Download);
        let sibling = TransferTask::new(request(1), Direction::Download);
        let other = TransferTask::new(request(2), Direction::Upload);
        for task in [&target, &sibling, &other] {
            registry.register(task.clone()).await;
        }

        let cancelled = match registry.cancel(request(1), target.id()).await {
            Ok(task) => task,
            Err(e) => panic!("cancel failed: {e}"),
        };

        assert_eq!(cancelled.status(), TaskStatus::Cancelled);
        assert!(target.cancellation_token().is_cancelled());
        assert!(!sibling.cancellation_token().is_cancelled());
        assert!(!other.cancellation_token().is_cancelled());
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.find_by_request(request(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn cancel_request_scans_every_task() {
        let registry = TaskRegistry::new();
        let first = TransferTask::new(request(1), Direction::Download);
        let second = TransferTask::new(request(1), Direction::Download);
        let other = TransferTask::new(request(3), Direction::Download);
        for task in [&first, &second, &other] {
            registry.register(task.clone()).await;
        }

        let cancelled = match registry.cancel_request(request(1)).await {
            Ok(tasks) => tasks,
            Err(e) => panic!("cancel_request failed: {e}"),
        };

        assert_eq!(cancelled.len(), 2);
        assert!(first.cancellation_token().is_cancelled());
        assert!(second.cancellation_token().is_cancelled());
        assert!(!registry.contains(request(1)).await);
        assert!(registry.contains(request(3)).await);

        let again = registry.cancel_request(request(1)).await;
        assert!(matches!(again, Err(TransmissionError::NotFound(_))));
    }

    #[tokio::test]
    async fn open_request_without_tasks_can_be_cancelled() {
        let registry = TaskRegistry::new();
        let token = registry.open_request(request(1)).await;

        let finished = TransferTask::child_of(request(1), Direction::Download, &token);
        registry.register(finished.clone()).await;
        registry.unregister(request(1), finished.id()).await;
        assert!(registry.contains(request(1)).await);
        assert_eq!(registry.len().await, 0);

        let cancelled = registry.cancel_request(request(1)).await;
        assert!(matches!(cancelled, Ok(ref tasks) if tasks.is_empty()));
        assert!(token.is_cancelled());
        assert!(finished.cancellation_token().is_cancelled());
        assert!(registry.is_empty().await);

        registry.close_request(request(1)).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn closing_keeps_running_tasks_reachable() {
        let registry = TaskRegistry::new();
        let token = registry.open_request(request(1)).await;
        let task = TransferTask::child_of(request(1), Direction::Upload, &token);
        registry.register(task.clone()).await;

        registry.close_request(request(1)).await;
        assert!(registry.contains(request(1)).await);

        registry.unregister(request(1), task.id()).await;
        assert!(registry.is_empty().await);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn child_task_follows_parent_only() {
        let parent = CancellationToken::new();
        let first = TransferTask::child_of(request(1), Direction::Download, &parent);
        let second = TransferTask::child_of(request(1), Direction::Download, &parent);

        first.cancel();
        assert!(!parent.is_cancelled());
        assert!(!second.cancellation_token().is_cancelled());

        parent.cancel();
        assert!(second.cancellation_token().is_cancelled());
    }

    #[test]
    fn terminal_status_is_absorbing() {
        let mut task = TransferTask::new(request(1), Direction::Download);
        task.finish(TaskStatus::Failed);
        task.finish(TaskStatus::Completed);
        assert_eq!(task.status(), TaskStatus::Failed);
    }
}
