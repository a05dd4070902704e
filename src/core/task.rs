//! Task records and completion events.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::error::{TaskError, TaskResult};

/// Unique identifier assigned at submission.
pub type TaskId = Uuid;

/// Callback invoked exactly once with the task's outcome.
pub type TaskCallback<T> = Box<dyn FnOnce(TaskResult<T>) + Send + 'static>;

/// Scheduling metadata captured at submission.
#[derive(Debug, Clone, Copy)]
pub struct TaskMetadata {
    /// Unique task identifier.
    pub id: TaskId,
    /// Priority, higher runs first. Zero unless a priority function is set.
    pub priority: i64,
    /// When the task entered the waiting store.
    pub enqueued_at: Instant,
    /// Waiting deadline; `None` without a waiting timeout.
    pub deadline: Option<Instant>,
}

impl TaskMetadata {
    /// Whether the waiting deadline has strictly passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline < now)
    }
}

/// One accepted unit of work waiting for admission.
///
/// Every task carries all optional fields; the queue decides from its own
/// configuration whether priority, fairness key or deadline are meaningful.
pub struct Task<A, T, K> {
    /// Scheduling metadata.
    pub meta: TaskMetadata,
    /// Fairness group. `()` when fairness is disabled.
    pub key: K,
    /// Arguments forwarded to the work function.
    pub args: A,
    pub(crate) callback: TaskCallback<T>,
}

impl<A, T, K> Task<A, T, K> {
    /// Create a task record.
    pub fn new(meta: TaskMetadata, key: K, args: A, callback: TaskCallback<T>) -> Self {
        Self {
            meta,
            key,
            args,
            callback,
        }
    }

    /// Split into parts for execution.
    pub(crate) fn into_parts(self) -> (TaskMetadata, A, TaskCallback<T>) {
        (self.meta, self.args, self.callback)
    }
}

impl<A: fmt::Debug, T, K: fmt::Debug> fmt::Debug for Task<A, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("meta", &self.meta)
            .field("key", &self.key)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks currently executing.
    pub running: usize,
    /// Tasks in the waiting store, including ones whose deadline has passed
    /// but which have not been extracted yet.
    pub waiting: usize,
    /// Concurrency limit.
    pub concurrency: usize,
    /// `running == 0 && waiting == 0`.
    pub is_drain: bool,
}

impl QueueStats {
    /// Build a snapshot, deriving `is_drain`.
    #[must_use]
    pub const fn new(running: usize, waiting: usize, concurrency: usize) -> Self {
        Self {
            running,
            waiting,
            concurrency,
            is_drain: running == 0 && waiting == 0,
        }
    }
}

/// Published to the observability bus once per finished task.
#[derive(Debug)]
pub struct TaskEvent<A, T> {
    /// Task identifier.
    pub id: TaskId,
    /// Arguments the task was submitted with.
    pub args: A,
    /// Outcome, identical to what the task callback received.
    pub result: TaskResult<T>,
    /// Queue stats at the moment of completion.
    pub stats: QueueStats,
}

impl<A, T> TaskEvent<A, T> {
    /// The error, if the task failed.
    pub const fn error(&self) -> Option<&TaskError> {
        match &self.result {
            Ok(_) => None,
            Err(err) => Some(err),
        }
    }

    /// True when the task produced a value.
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
