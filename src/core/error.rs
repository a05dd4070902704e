//! Error types for queue construction and task outcomes.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while building or configuring a queue.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No tokio runtime was available to spawn work on.
    #[error("no tokio runtime available")]
    NoRuntime,
}

/// Why a task finished without a result.
///
/// Every variant is delivered exactly once to the task's callback and then to
/// the completion listeners; none of them stop the queue.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The task sat in the waiting store past its waiting deadline and was
    /// discarded without running.
    #[error("waiting in queue({name}) took longer than {}ms", .timeout.as_millis())]
    WaitingTimeout {
        /// Configured waiting timeout.
        timeout: Duration,
        /// Name of the queued work.
        name: String,
    },
    /// The work did not complete within the configured processing timeout.
    #[error("{name} took longer than {}ms", .timeout.as_millis())]
    ProcessingTimeout {
        /// Configured processing timeout.
        timeout: Duration,
        /// Name of the queued work.
        name: String,
    },
    /// Error reported by the work function itself.
    #[error("{0}")]
    Upstream(Arc<anyhow::Error>),
    /// The work future was dropped or panicked before reporting completion.
    #[error("{0} stopped before reporting completion")]
    Interrupted(String),
}

impl TaskError {
    /// Wrap an error returned by the work function.
    pub fn upstream(err: anyhow::Error) -> Self {
        Self::Upstream(Arc::new(err))
    }

    /// True for either timeout class.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitingTimeout { .. } | Self::ProcessingTimeout { .. })
    }

    /// The underlying work error, if this is an upstream failure.
    #[must_use]
    pub fn as_upstream(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Upstream(err) => Some(&**err),
            _ => None,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Outcome delivered to task callbacks and completion listeners.
pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_timeout_display() {
        let err = TaskError::WaitingTimeout {
            timeout: Duration::from_millis(50),
            name: "hash_file".into(),
        };
        assert_eq!(err.to_string(), "waiting in queue(hash_file) took longer than 50ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_processing_timeout_display() {
        let err = TaskError::ProcessingTimeout {
            timeout: Duration::from_millis(200),
            name: "hash_file".into(),
        };
        assert_eq!(err.to_string(), "hash_file took longer than 200ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_upstream_is_forwarded_unchanged() {
        let err = TaskError::upstream(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");
        assert!(!err.is_timeout());
        assert_eq!(err.as_upstream().map(ToString::to_string).as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::InvalidConfig("concurrency must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: concurrency must be greater than 0"
        );
        assert_eq!(SchedulerError::NoRuntime.to_string(), "no tokio runtime available");
    }
}
