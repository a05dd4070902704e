//! Waiting store backends.

pub mod memory;

pub use memory::{Extracted, InMemoryQueue};
