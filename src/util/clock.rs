//! Monotonic clock helpers.
//!
//! Deadlines are measured with [`tokio::time::Instant`] so that tests running
//! on a paused tokio clock observe the same time as the scheduler.

use std::time::Duration;

use tokio::time::Instant;

/// Current instant on the tokio clock.
#[must_use]
pub fn now() -> Instant {
    Instant::now()
}

/// Deadline `timeout` after `from`, if a timeout is configured.
#[must_use]
pub fn deadline_after(from: Instant, timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|t| from + t)
}
