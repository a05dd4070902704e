//! # Prometheus Fair Queue
//!
//! An in-process task queue that bounds how many asynchronous operations run
//! at once, with optional priority ordering, optional fairness groups serviced
//! round-robin, waiting and processing timeouts, and an observable completion
//! stream.
//!
//! ## Key Features
//!
//! - **Concurrency limit**: never more than `concurrency` tasks run at a time
//! - **Priorities**: a priority function orders waiting tasks, highest first, FIFO on ties
//! - **Fairness**: a key function partitions waiting tasks; partitions take turns
//! - **Timeouts**: waiting timeouts discard stale tasks at admission, processing
//!   timeouts stop waiting for slow work
//! - **Observability**: `on_success`, `on_failure`, `on_done` and `on_drain` listeners
//! - **Pause/resume**: stop and restart admission without losing queued work
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_fair_queue::builders::QueueBuilder;
//! use prometheus_fair_queue::core::from_fn;
//!
//! let queue = QueueBuilder::<(String, u64)>::new("fetch")
//!     .with_concurrency(2)
//!     .with_process_timeout(Duration::from_secs(5))
//!     .with_priority(|(_, urgency)| *urgency as i64)
//!     .with_fairness(|(tenant, _)| tenant.clone())
//!     .build_on_current(from_fn(|(tenant, urgency)| async move {
//!         Ok(format!("{tenant}:{urgency}"))
//!     }))?;
//!
//! queue.on_drain(|| tracing::info!("all work finished"));
//! let result = queue.submit_async(("acme".into(), 3)).await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: admission control, timeouts, observability.
pub mod core;
/// Configuration models for queues and timeouts.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Infrastructure adapters backing the waiting store.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::QueueBuilder;
pub use crate::config::QueueConfig;
pub use crate::core::{QueueStats, TaskError, TaskQueue, TaskResult};
