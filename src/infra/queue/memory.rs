//! In-memory waiting store with priority ordering and fairness partitioning.
//!
//! Tasks are partitioned by fairness key. Each partition is a max-heap ordered
//! by priority, ties broken by submission sequence, so a partition whose
//! tasks all share one priority behaves as a FIFO. Non-empty partitions are
//! serviced round-robin: the partition at the front yields one task and, if
//! it still holds tasks, moves to the back of the rotation; an emptied
//! partition is removed.
//!
//! With fairness disabled the key type is `()`, giving a single partition and
//! therefore a flat priority (or, without priorities, FIFO) order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::hash::Hash;

use tokio::time::Instant;

use crate::core::Task;

/// Result of pulling the next task from the store.
#[derive(Debug)]
pub enum Extracted<X> {
    /// A task that has not exceeded its waiting deadline.
    Ready(X),
    /// The store had entries but every candidate in this pass was expired.
    NoneReady,
    /// The store had no entries at all.
    Empty,
}

/// Wrapper to make a task orderable by priority (highest first) and FIFO within priority.
struct PriorityTask<A, T, K> {
    seq: u64,
    task: Task<A, T, K>,
}

impl<A, T, K> PartialEq for PriorityTask<A, T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<A, T, K> Eq for PriorityTask<A, T, K> {}

impl<A, T, K> PartialOrd for PriorityTask<A, T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A, T, K> Ord for PriorityTask<A, T, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.task.meta.priority.cmp(&other.task.meta.priority) {
            // Earlier submission wins (reversed for max-heap).
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// In-memory waiting store. Unbounded: enqueue never fails.
pub struct InMemoryQueue<A, T, K> {
    partitions: HashMap<K, BinaryHeap<PriorityTask<A, T, K>>>,
    /// Round-robin order of non-empty partitions.
    rotation: VecDeque<K>,
    next_seq: u64,
    len: usize,
}

impl<A, T, K> Default for InMemoryQueue<A, T, K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, K> InMemoryQueue<A, T, K>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: HashMap::new(),
            rotation: VecDeque::new(),
            next_seq: 0,
            len: 0,
        }
    }

    /// Insert a task into its fairness partition. O(log n).
    pub fn enqueue(&mut self, task: Task<A, T, K>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.len += 1;

        if let Some(heap) = self.partitions.get_mut(&task.key) {
            heap.push(PriorityTask { seq, task });
            return;
        }
        let key = task.key.clone();
        let mut heap = BinaryHeap::new();
        heap.push(PriorityTask { seq, task });
        self.partitions.insert(key.clone(), heap);
        self.rotation.push_back(key);
    }

    /// Remove and return the next task whose waiting deadline has not passed
    /// at `now`.
    ///
    /// Expired candidates met on the way are removed and pushed onto
    /// `expired` for the caller to fail; they are never returned as ready.
    pub fn extract_next(
        &mut self,
        now: Instant,
        expired: &mut Vec<Task<A, T, K>>,
    ) -> Extracted<Task<A, T, K>> {
        if self.len == 0 {
            return Extracted::Empty;
        }

        while let Some(key) = self.rotation.pop_front() {
            let (entry, drained) = match self.partitions.get_mut(&key) {
                Some(heap) => (heap.pop(), heap.is_empty()),
                None => continue,
            };
            if drained {
                self.partitions.remove(&key);
            } else {
                self.rotation.push_back(key);
            }

            let Some(PriorityTask { task, .. }) = entry else {
                continue;
            };
            self.len -= 1;

            if task.meta.is_expired(now) {
                expired.push(task);
                continue;
            }
            return Extracted::Ready(task);
        }

        Extracted::NoneReady
    }
}

impl<A, T, K> InMemoryQueue<A, T, K> {
    /// Total pending tasks across all partitions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no task is pending.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty fairness partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}
