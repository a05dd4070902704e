//! Builder wiring configuration, work function, spawner and the optional
//! priority and fairness functions into a [`TaskQueue`].

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueConfig;
use crate::core::queue::QueueParts;
use crate::core::{KeyFn, PriorityFn, SchedulerError, Spawn, TaskExecutor, TaskQueue};
use crate::runtime::TokioSpawner;

/// Builder for [`TaskQueue`].
///
/// `K` is the fairness key type; it stays `()` (a single implicit group)
/// unless [`QueueBuilder::with_fairness`] is called.
///
/// ```rust,ignore
/// let queue = QueueBuilder::<Upload>::new("uploads")
///     .with_concurrency(4)
///     .with_waiting_timeout(Duration::from_secs(30))
///     .with_priority(|job: &Upload| job.urgency)
///     .with_fairness(|job: &Upload| job.tenant.clone())
///     .build_on_current(from_fn(upload))?;
/// ```
pub struct QueueBuilder<A, K = ()> {
    config: QueueConfig,
    priority: Option<PriorityFn<A>>,
    key_fn: KeyFn<A, K>,
    fair: bool,
}

impl<A> QueueBuilder<A, ()>
where
    A: 'static,
{
    /// Start from default settings with the given work name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(QueueConfig {
            name: name.into(),
            ..QueueConfig::default()
        })
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: QueueConfig) -> Self {
        Self {
            config,
            priority: None,
            key_fn: Arc::new(|_: &A| ()),
            fair: false,
        }
    }
}

impl<A, K> QueueBuilder<A, K>
where
    A: 'static,
{
    /// Name of the queued work.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Maximum number of simultaneously running tasks.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Defer admission passes triggered by submit/resume by one tick.
    #[must_use]
    pub const fn with_deferred_start(mut self, deferred: bool) -> Self {
        self.config.deferred_start = deferred;
        self
    }

    /// Start paused.
    #[must_use]
    pub const fn with_paused(mut self, paused: bool) -> Self {
        self.config.paused = paused;
        self
    }

    /// Discard tasks that wait longer than `timeout` for admission.
    #[must_use]
    pub fn with_waiting_timeout(mut self, timeout: Duration) -> Self {
        self.config.waiting_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Fail tasks that run longer than `timeout`.
    #[must_use]
    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.config.process_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Order waiting tasks by `priority(args)`, highest first.
    #[must_use]
    pub fn with_priority<F>(mut self, priority: F) -> Self
    where
        F: Fn(&A) -> i64 + Send + Sync + 'static,
    {
        self.priority = Some(Arc::new(priority));
        self
    }

    /// Partition waiting tasks by `key(args)` and service the partitions
    /// round-robin.
    pub fn with_fairness<K2, F>(self, key: F) -> QueueBuilder<A, K2>
    where
        F: Fn(&A) -> K2 + Send + Sync + 'static,
    {
        QueueBuilder {
            config: self.config,
            priority: self.priority,
            key_fn: Arc::new(key),
            fair: true,
        }
    }

    /// Build the queue on an explicit spawner.
    pub fn build<T, E, S>(self, executor: E, spawner: S) -> Result<TaskQueue<A, T, E, S, K>, SchedulerError>
    where
        A: Clone + Send,
        T: Clone + Send + 'static,
        E: TaskExecutor<A, T>,
        S: Spawn + Send + Sync + 'static,
        K: Hash + Eq + Clone + Send + 'static,
    {
        TaskQueue::from_parts(QueueParts {
            config: self.config,
            executor,
            spawner,
            priority: self.priority,
            key_fn: self.key_fn,
            fair: self.fair,
        })
    }

    /// Build the queue on the tokio runtime the caller is running on.
    pub fn build_on_current<T, E>(
        self,
        executor: E,
    ) -> Result<TaskQueue<A, T, E, TokioSpawner, K>, SchedulerError>
    where
        A: Clone + Send,
        T: Clone + Send + 'static,
        E: TaskExecutor<A, T>,
        K: Hash + Eq + Clone + Send + 'static,
    {
        let spawner = TokioSpawner::try_current().ok_or(SchedulerError::NoRuntime)?;
        self.build(executor, spawner)
    }
}

impl<A, K> fmt::Debug for QueueBuilder<A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueBuilder")
            .field("config", &self.config)
            .field("prioritized", &self.priority.is_some())
            .field("fair", &self.fair)
            .finish()
    }
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
