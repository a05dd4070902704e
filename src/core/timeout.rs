//! Waiting and processing timeouts.
//!
//! Waiting deadlines are stamped at submission and only checked when a task
//! is pulled from the waiting store; there is no timer per queued task, so an
//! expired task stays counted as waiting until the admission controller next
//! reaches it.
//!
//! Processing timeouts race the work against a timer. The work runs as its
//! own spawned future that reports through a oneshot channel; if the timer
//! wins, the receiver is dropped and the work's eventual result is discarded.
//! The work itself is not cancelled.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::error::{AppResult, TaskError, TaskResult};
use super::executor::TaskExecutor;
use super::queue::Spawn;

/// Computes waiting deadlines and guards task execution.
#[derive(Debug, Clone)]
pub struct TimeoutSupervisor {
    name: String,
    waiting_timeout: Option<Duration>,
    process_timeout: Option<Duration>,
}

impl TimeoutSupervisor {
    /// Create a supervisor; `name` identifies the work in timeout errors.
    pub fn new(
        name: impl Into<String>,
        waiting_timeout: Option<Duration>,
        process_timeout: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            waiting_timeout,
            process_timeout,
        }
    }

    /// Name of the supervised work.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured waiting timeout.
    #[must_use]
    pub const fn waiting_timeout(&self) -> Option<Duration> {
        self.waiting_timeout
    }

    /// Configured processing timeout.
    #[must_use]
    pub const fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout
    }

    /// Deadline for a task enqueued at `enqueued_at`.
    #[must_use]
    pub fn waiting_deadline(&self, enqueued_at: Instant) -> Option<Instant> {
        crate::util::clock::deadline_after(enqueued_at, self.waiting_timeout)
    }

    /// Error delivered to a task discarded for exceeding its waiting deadline.
    #[must_use]
    pub fn waiting_error(&self) -> TaskError {
        TaskError::WaitingTimeout {
            timeout: self.waiting_timeout.unwrap_or_default(),
            name: self.name.clone(),
        }
    }

    /// Spawn the work for one task and wait for its outcome, bounded by the
    /// processing timeout when one is configured.
    pub async fn run<A, T, E, S>(&self, spawner: &S, executor: E, args: A) -> TaskResult<T>
    where
        A: Send + 'static,
        T: Send + 'static,
        E: TaskExecutor<A, T>,
        S: Spawn,
    {
        let (tx, rx) = oneshot::channel();
        spawner.spawn(async move {
            let result = executor.execute(args).await;
            // Fails only when the processing timeout already fired.
            let _ = tx.send(result);
        });
        self.await_completion(rx).await
    }

    /// Wait for a completion report, applying the processing timeout.
    ///
    /// Exactly one outcome is produced: either the work's report or the
    /// timeout error, whichever comes first.
    pub async fn await_completion<T>(&self, rx: oneshot::Receiver<AppResult<T>>) -> TaskResult<T> {
        let received = match self.process_timeout {
            None => rx.await,
            Some(limit) => {
                if let Ok(received) = tokio::time::timeout(limit, rx).await {
                    received
                } else {
                    tracing::warn!(queue = %self.name, timeout = ?limit, "processing timeout elapsed");
                    return Err(TaskError::ProcessingTimeout {
                        timeout: limit,
                        name: self.name.clone(),
                    });
                }
            }
        };

        match received {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskError::upstream(err)),
            Err(_) => Err(TaskError::Interrupted(self.name.clone())),
        }
    }
}
