//! Concurrency-bounded task queue: admission control, pause/resume and stats.
//!
//! All scheduler state (waiting store, running count, paused flag) lives
//! behind one `parking_lot::Mutex`, so every admission decision is made
//! atomically with respect to submissions, completions and resumes. Task
//! callbacks, listeners and the user's priority/fairness functions are always
//! invoked with the lock released.
//!
//! Admission is re-evaluated on every trigger (submit, completion, resume,
//! deferred retry):
//!
//! 1. paused, or `running == concurrency`: nothing to do;
//! 2. waiting store empty: the queue is idle (drained when nothing runs);
//! 3. every candidate expired in this pass: fail them and retry on a fresh
//!    spawned pass rather than recursing;
//! 4. otherwise take a slot and spawn the task; its completion releases the
//!    slot, calls the task callback, publishes to the bus and re-evaluates.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::{SchedulerError, TaskError, TaskResult};
use super::executor::TaskExecutor;
use super::observe::{EventBus, Subscription, SubscriptionId};
use super::task::{QueueStats, Task, TaskCallback, TaskEvent, TaskId, TaskMetadata};
use super::timeout::TimeoutSupervisor;
use crate::config::QueueConfig;
use crate::infra::queue::{Extracted, InMemoryQueue};
use crate::util::clock;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Derives a task's priority from its arguments.
pub type PriorityFn<A> = Arc<dyn Fn(&A) -> i64 + Send + Sync>;

/// Derives a task's fairness key from its arguments.
pub type KeyFn<A, K> = Arc<dyn Fn(&A) -> K + Send + Sync>;

/// Everything needed to assemble a queue; produced by the builder.
pub(crate) struct QueueParts<A, E, S, K> {
    pub config: QueueConfig,
    pub executor: E,
    pub spawner: S,
    pub priority: Option<PriorityFn<A>>,
    pub key_fn: KeyFn<A, K>,
    pub fair: bool,
}

struct SchedulerState<A, T, K> {
    store: InMemoryQueue<A, T, K>,
    running: usize,
    paused: bool,
}

enum Step<A, T, K> {
    Start(Task<A, T, K>),
    Retry,
    Idle,
    Blocked,
}

struct QueueInner<A, T, E, S, K> {
    concurrency: usize,
    deferred_start: bool,
    fair: bool,
    state: Mutex<SchedulerState<A, T, K>>,
    supervisor: TimeoutSupervisor,
    priority: Option<PriorityFn<A>>,
    key_fn: KeyFn<A, K>,
    bus: EventBus<A, T>,
    executor: E,
    spawner: S,
}

/// Handle to a task queue. Cheap to clone; clones share one scheduler.
///
/// Combines the scheduling surface (`submit`, `pause`, `resume`, `stats`)
/// with the observability surface (`subscribe`, `on_success`, `on_failure`,
/// `on_done`, `on_drain`).
pub struct TaskQueue<A, T, E, S, K = ()> {
    inner: Arc<QueueInner<A, T, E, S, K>>,
}

impl<A, T, E, S, K> Clone for TaskQueue<A, T, E, S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E, S> TaskQueue<A, T, E, S, ()>
where
    A: Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: TaskExecutor<A, T>,
    S: Spawn + Send + Sync + 'static,
{
    /// Create a queue without priorities or fairness groups.
    ///
    /// Use [`crate::builders::QueueBuilder`] to configure priority and
    /// fairness functions.
    pub fn new(config: QueueConfig, executor: E, spawner: S) -> Result<Self, SchedulerError> {
        Self::from_parts(QueueParts {
            config,
            executor,
            spawner,
            priority: None,
            key_fn: Arc::new(|_: &A| ()),
            fair: false,
        })
    }
}

impl<A, T, E, S, K> TaskQueue<A, T, E, S, K>
where
    A: Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: TaskExecutor<A, T>,
    S: Spawn + Send + Sync + 'static,
    K: Hash + Eq + Clone + Send + 'static,
{
    pub(crate) fn from_parts(parts: QueueParts<A, E, S, K>) -> Result<Self, SchedulerError> {
        let QueueParts {
            config,
            executor,
            spawner,
            priority,
            key_fn,
            fair,
        } = parts;
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let supervisor = TimeoutSupervisor::new(
            config.name.clone(),
            config.waiting_timeout(),
            config.process_timeout(),
        );
        tracing::debug!(
            queue = %config.name,
            concurrency = config.concurrency,
            prioritized = priority.is_some(),
            fair,
            paused = config.paused,
            "queue created"
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                concurrency: config.concurrency,
                deferred_start: config.deferred_start,
                fair,
                state: Mutex::new(SchedulerState {
                    store: InMemoryQueue::new(),
                    running: 0,
                    paused: config.paused,
                }),
                supervisor,
                priority,
                key_fn,
                bus: EventBus::new(),
                executor,
                spawner,
            }),
        })
    }

    /// Submit a task. Never fails: the task is queued even while paused or
    /// at capacity, and `callback` is invoked exactly once with its outcome.
    pub fn submit<F>(&self, args: A, callback: F) -> TaskId
    where
        F: FnOnce(TaskResult<T>) + Send + 'static,
    {
        self.inner.submit(args, Box::new(callback))
    }

    /// Submit a task and get a future resolving to its outcome.
    pub fn submit_async(&self, args: A) -> TaskHandle<T> {
        let (tx, rx) = oneshot::channel();
        let id = self.submit(args, move |result| {
            // The caller may have dropped the handle; the outcome still
            // reaches the bus.
            let _ = tx.send(result);
        });
        TaskHandle {
            id,
            name: self.name().to_owned(),
            rx,
        }
    }

    /// Stop admitting new tasks. Running tasks continue; submissions still
    /// queue.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        if !state.paused {
            state.paused = true;
            tracing::info!(queue = %self.inner.supervisor.name(), "queue paused");
        }
    }

    /// Resume admission. No-op unless paused.
    pub fn resume(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
        }
        tracing::info!(queue = %self.inner.supervisor.name(), "queue resumed");
        self.inner.trigger();
    }

    /// Whether admission is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Snapshot of running/waiting counts.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        self.inner.stats_of(&state)
    }

    /// Concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Name identifying the queued work.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.supervisor.name()
    }

    /// The completion bus backing the `on_*` helpers.
    #[must_use]
    pub fn bus(&self) -> &EventBus<A, T> {
        &self.inner.bus
    }

    /// Register a listener for every completion.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<A, T>
    where
        F: Fn(&TaskEvent<A, T>) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(listener)
    }

    /// Remove a listener by id. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// See [`EventBus::on_success`].
    pub fn on_success<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&T, &A) + Send + Sync + 'static,
    {
        self.inner.bus.on_success(callback)
    }

    /// See [`EventBus::on_failure`].
    pub fn on_failure<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&TaskError, &A) + Send + Sync + 'static,
    {
        self.inner.bus.on_failure(callback)
    }

    /// See [`EventBus::on_done`].
    pub fn on_done<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&TaskEvent<A, T>) + Send + Sync + 'static,
    {
        self.inner.bus.on_done(callback)
    }

    /// See [`EventBus::on_drain`].
    pub fn on_drain<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.bus.on_drain(callback)
    }
}

impl<A, T, E, S, K> QueueInner<A, T, E, S, K>
where
    A: Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: TaskExecutor<A, T>,
    S: Spawn + Send + Sync + 'static,
    K: Hash + Eq + Clone + Send + 'static,
{
    fn stats_of(&self, state: &SchedulerState<A, T, K>) -> QueueStats {
        QueueStats::new(state.running, state.store.len(), self.concurrency)
    }

    fn submit(self: &Arc<Self>, args: A, callback: TaskCallback<T>) -> TaskId {
        let now = clock::now();
        let meta = TaskMetadata {
            id: Uuid::new_v4(),
            priority: self.priority.as_ref().map_or(0, |priority| priority(&args)),
            enqueued_at: now,
            deadline: self.supervisor.waiting_deadline(now),
        };
        let key = (self.key_fn)(&args);

        let waiting = {
            let mut state = self.state.lock();
            state.store.enqueue(Task::new(meta, key, args, callback));
            state.store.len()
        };
        tracing::debug!(task = %meta.id, priority = meta.priority, waiting, "task enqueued");

        self.trigger();
        meta.id
    }

    /// Admission pass for submit/resume, deferred one tick when configured.
    fn trigger(self: &Arc<Self>) {
        if self.deferred_start {
            self.defer();
        } else {
            self.pump();
        }
    }

    fn defer(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.spawner.spawn(async move { inner.pump() });
    }

    /// Admit tasks until the queue is paused, full, or out of ready work.
    fn pump(self: &Arc<Self>) {
        loop {
            let mut expired = Vec::new();
            let (step, running) = {
                let mut state = self.state.lock();
                let running = state.running;
                let step = if state.paused || state.running >= self.concurrency {
                    Step::Blocked
                } else {
                    match state.store.extract_next(clock::now(), &mut expired) {
                        Extracted::Ready(task) => {
                            state.running += 1;
                            Step::Start(task)
                        }
                        Extracted::NoneReady => Step::Retry,
                        Extracted::Empty => Step::Idle,
                    }
                };
                (step, running)
            };

            // Expired tasks later in this pass are out of the store but not
            // yet reported, so they still count as waiting.
            let total = expired.len();
            for (idx, task) in expired.into_iter().enumerate() {
                self.expire(task, total - 1 - idx);
            }

            match step {
                Step::Start(task) => self.start(task),
                Step::Retry => {
                    tracing::debug!(queue = %self.supervisor.name(), "no ready task, retrying admission");
                    self.defer();
                    return;
                }
                Step::Idle => {
                    if running == 0 {
                        tracing::debug!(queue = %self.supervisor.name(), "queue drained");
                    }
                    return;
                }
                Step::Blocked => return,
            }
        }
    }

    fn start(self: &Arc<Self>, task: Task<A, T, K>) {
        let (meta, args, callback) = task.into_parts();
        tracing::debug!(
            task = %meta.id,
            waited = ?meta.enqueued_at.elapsed(),
            fair = self.fair,
            "task admitted"
        );

        let inner = Arc::clone(self);
        self.spawner.spawn(async move {
            let result = inner
                .supervisor
                .run(&inner.spawner, inner.executor.clone(), args.clone())
                .await;
            inner.complete(meta, args, callback, result);
        });
    }

    fn complete(
        self: &Arc<Self>,
        meta: TaskMetadata,
        args: A,
        callback: TaskCallback<T>,
        result: TaskResult<T>,
    ) {
        self.state.lock().running -= 1;
        match &result {
            Ok(_) => tracing::debug!(task = %meta.id, "task completed"),
            Err(err) => tracing::info!(task = %meta.id, error = %err, "task failed"),
        }

        run_callback(meta.id, callback, result.clone());
        // Taken after the callback, which may have submitted more work.
        let stats = self.live_stats(0);
        self.inner_publish(meta.id, args, result, stats);
        self.pump();
    }

    fn expire(&self, task: Task<A, T, K>, pending: usize) {
        let (meta, args, callback) = task.into_parts();
        let err = self.supervisor.waiting_error();
        tracing::warn!(
            task = %meta.id,
            queue = %self.supervisor.name(),
            waited = ?meta.enqueued_at.elapsed(),
            "task exceeded waiting timeout"
        );
        run_callback(meta.id, callback, Err(err.clone()));
        let stats = self.live_stats(pending);
        self.inner_publish(meta.id, args, Err(err), stats);
    }

    /// Current stats, counting `pending` extracted-but-unreported tasks as
    /// waiting.
    fn live_stats(&self, pending: usize) -> QueueStats {
        let state = self.state.lock();
        QueueStats::new(state.running, state.store.len() + pending, self.concurrency)
    }

    fn inner_publish(&self, id: TaskId, args: A, result: TaskResult<T>, stats: QueueStats) {
        self.bus.publish(&TaskEvent {
            id,
            args,
            result,
            stats,
        });
    }
}

/// Invoke a task callback, containing a panic so the completion path still
/// publishes and re-runs admission.
fn run_callback<T>(task: TaskId, callback: TaskCallback<T>, result: TaskResult<T>) {
    if panic::catch_unwind(AssertUnwindSafe(move || callback(result))).is_err() {
        tracing::error!(task = %task, "task callback panicked");
    }
}

impl<A, T, E, S, K> fmt::Debug for TaskQueue<A, T, E, S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskQueue")
            .field("name", &self.inner.supervisor.name())
            .field("concurrency", &self.inner.concurrency)
            .field("running", &state.running)
            .field("waiting", &state.store.len())
            .field("paused", &state.paused)
            .finish_non_exhaustive()
    }
}

/// Future resolving to the outcome of a task submitted with
/// [`TaskQueue::submit_async`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    name: String,
    rx: oneshot::Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Identifier of the submitted task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let name = &this.name;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(TaskError::Interrupted(name.clone()))))
    }
}
