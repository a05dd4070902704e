//! Core scheduling abstractions: task records, admission control, timeouts
//! and completion observability.

pub mod error;
pub mod executor;
pub mod observe;
pub mod queue;
pub mod task;
pub mod timeout;

pub use error::{AppResult, SchedulerError, TaskError, TaskResult};
pub use executor::{from_callback, from_fn, CallbackExecutor, Completion, FnExecutor, TaskExecutor};
pub use observe::{EventBus, Subscription, SubscriptionId};
pub use queue::{KeyFn, PriorityFn, Spawn, TaskHandle, TaskQueue};
pub use task::{QueueStats, Task, TaskCallback, TaskEvent, TaskId, TaskMetadata};
pub use timeout::TimeoutSupervisor;
