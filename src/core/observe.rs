//! Observability bus for task completions.
//!
//! Every finished task (success, upstream failure, either timeout) is
//! published once, after the task's own callback has run. Listeners are
//! called synchronously in registration order. The success, failure, done and
//! drain views are plain filters over the raw subscription.
//!
//! Publishing iterates over a snapshot of the listener list, so a listener
//! may unsubscribe itself (or others) from inside its own invocation. A
//! removal takes effect from the next published event. A panicking listener
//! is logged and skipped; the remaining listeners still run.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::error::TaskError;
use super::task::TaskEvent;

/// Stable identifier of a registered listener.
pub type SubscriptionId = u64;

type Listener<A, T> = Arc<dyn Fn(&TaskEvent<A, T>) + Send + Sync>;

struct BusInner<A, T> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<A, T>)>>,
    next_id: AtomicU64,
}

impl<A, T> BusInner<A, T> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// Fan-out of completion events to registered listeners.
pub struct EventBus<A, T> {
    inner: Arc<BusInner<A, T>>,
}

impl<A, T> Clone for EventBus<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T> Default for EventBus<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T> fmt::Debug for EventBus<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<A, T> EventBus<A, T> {
    /// Create a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener for every completion.
    ///
    /// The listener stays registered until removed through the returned
    /// handle or [`EventBus::unsubscribe`]; dropping the handle does not
    /// remove it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<A, T>
    where
        F: Fn(&TaskEvent<A, T>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        tracing::trace!(subscription = id, "listener registered");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove(id)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Deliver one event to every listener registered at the time of the call.
    pub fn publish(&self, event: &TaskEvent<A, T>) {
        let snapshot: Vec<Listener<A, T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(task = %event.id, "completion listener panicked");
            }
        }
    }

    /// Called with the value and arguments of every successful task.
    pub fn on_success<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&T, &A) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let Ok(value) = &event.result {
                callback(value, &event.args);
            }
        })
    }

    /// Called with the error and arguments of every failed task.
    pub fn on_failure<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&TaskError, &A) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let Err(err) = &event.result {
                callback(err, &event.args);
            }
        })
    }

    /// Called for every completion regardless of outcome.
    pub fn on_done<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn(&TaskEvent<A, T>) + Send + Sync + 'static,
    {
        self.subscribe(callback)
    }

    /// Called after a completion that left nothing running and nothing waiting.
    pub fn on_drain<F>(&self, callback: F) -> Subscription<A, T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if event.stats.is_drain {
                callback();
            }
        })
    }
}

/// Handle to a registered listener.
pub struct Subscription<A, T> {
    id: SubscriptionId,
    bus: Weak<BusInner<A, T>>,
}

impl<A, T> Subscription<A, T> {
    /// Identifier accepted by [`EventBus::unsubscribe`].
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener. Idempotent; returns true only on the call that
    /// actually removed it.
    pub fn unsubscribe(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| bus.remove(self.id))
    }
}

impl<A, T> fmt::Debug for Subscription<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
