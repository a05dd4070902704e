//! Work function abstraction.
//!
//! The queue treats the work as opaque: it invokes it once per admitted task
//! with the task's arguments and observes a single completion.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::error::AppResult;

/// Abstraction for running the work behind a queue.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_fair_queue::core::{AppResult, TaskExecutor};
///
/// #[derive(Clone)]
/// struct HashFile;
///
/// #[async_trait]
/// impl TaskExecutor<std::path::PathBuf, String> for HashFile {
///     async fn execute(&self, path: std::path::PathBuf) -> AppResult<String> {
///         let bytes = tokio::fs::read(&path).await?;
///         Ok(format!("{:x}", bytes.len()))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor<A, T>: Send + Sync + Clone + 'static
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Run the work for one task. Errors are forwarded to the task's callback
    /// unchanged.
    async fn execute(&self, args: A) -> AppResult<T>;
}

/// Executor backed by an async closure. Built with [`from_fn`].
pub struct FnExecutor<F, A, T> {
    f: Arc<F>,
    _marker: PhantomData<fn(A) -> T>,
}

impl<F, A, T> Clone for FnExecutor<F, A, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
            _marker: PhantomData,
        }
    }
}

/// Wrap an async closure as a [`TaskExecutor`].
pub fn from_fn<F, Fut, A, T>(f: F) -> FnExecutor<F, A, T>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    FnExecutor {
        f: Arc::new(f),
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, A, T> TaskExecutor<A, T> for FnExecutor<F, A, T>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    async fn execute(&self, args: A) -> AppResult<T> {
        (self.f)(args).await
    }
}

/// One-shot completion handle passed to callback-style work functions.
///
/// `complete` consumes the handle, so a work function can report at most
/// once. Dropping it without completing fails the task.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<AppResult<T>>,
}

impl<T> Completion<T> {
    /// Report the outcome of the work.
    pub fn complete(self, result: AppResult<T>) {
        // The receiver is gone only if the queue stopped waiting (processing
        // timeout); the late result is dropped.
        let _ = self.tx.send(result);
    }

    /// Report success.
    pub fn ok(self, value: T) {
        self.complete(Ok(value));
    }

    /// Report failure.
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.complete(Err(err.into()));
    }
}

/// Executor backed by a callback-style function. Built with [`from_callback`].
pub struct CallbackExecutor<F, A, T> {
    f: Arc<F>,
    _marker: PhantomData<fn(A) -> T>,
}

impl<F, A, T> Clone for CallbackExecutor<F, A, T> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
            _marker: PhantomData,
        }
    }
}

/// Wrap a function that reports through a [`Completion`] handle at some later
/// point, e.g. from a thread it spawned.
pub fn from_callback<F, A, T>(f: F) -> CallbackExecutor<F, A, T>
where
    F: Fn(A, Completion<T>) + Send + Sync + 'static,
{
    CallbackExecutor {
        f: Arc::new(f),
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, A, T> TaskExecutor<A, T> for CallbackExecutor<F, A, T>
where
    F: Fn(A, Completion<T>) + Send + Sync + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    async fn execute(&self, args: A) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        (self.f)(args, Completion { tx });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("completion handle dropped without a result")),
        }
    }
}
