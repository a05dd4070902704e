//! Configuration models for queues and their timeouts.

pub mod queue;

pub use queue::QueueConfig;
