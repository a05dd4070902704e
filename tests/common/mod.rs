//! Shared fixtures for queue integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_fair_queue::core::{AppResult, TaskExecutor};

/// A unit of test work.
#[derive(Debug, Clone)]
pub struct Job {
    pub label: String,
    pub group: &'static str,
    pub priority: i64,
    pub ms: u64,
    pub fail: bool,
}

impl Job {
    pub fn new(label: impl Into<String>, ms: u64) -> Self {
        Self {
            label: label.into(),
            group: "default",
            priority: 0,
            ms,
            fail: false,
        }
    }

    pub fn in_group(mut self, group: &'static str) -> Self {
        self.group = group;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

/// Executor that records start order and peak parallelism.
#[derive(Clone, Default)]
pub struct Recorder {
    started: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor<Job, String> for Recorder {
    async fn execute(&self, job: Job) -> AppResult<String> {
        self.started.lock().push(job.label.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(job.ms)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().push(job.label.clone());
        if job.fail {
            anyhow::bail!("{} failed", job.label);
        }
        Ok(job.label)
    }
}

/// Collects entries pushed from callbacks and listeners.
#[derive(Clone, Default)]
pub struct Log {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// Let time pass on the paused tokio clock; every ready task runs first.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
