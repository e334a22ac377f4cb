//! The bounded blocking queue itself.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::task::SyncTask;

/// Default capacity bound.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Heap entry ordered by `(priority ordinal, enqueue sequence)`.
///
/// The sequence number makes same-priority ordering deterministic: a plain
/// binary heap would pop equal-priority tasks in arbitrary order, starving
/// older entries behind newer ones.
struct QueueEntry {
    priority: u8,
    seq: u64,
    task: SyncTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    next_seq: u64,
    shutdown: bool,
}

/// Thread-safe bounded priority queue of [`SyncTask`]s.
///
/// `enqueue` blocks while the queue is at capacity, giving producers
/// back-pressure instead of unbounded memory growth; `dequeue` blocks while
/// the queue is empty. Both take a caller-supplied timeout. After
/// [`shutdown`](Self::shutdown), `enqueue` always fails and `dequeue` drains
/// the remaining tasks before returning `None`.
pub struct SyncQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl SyncQueue {
    /// Creates a queue with the default capacity of 10,000 tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a queue bounded at `capacity` tasks.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Inserts `task`, waiting up to `timeout` for room.
    ///
    /// Returns `false` if the queue stayed full for the whole timeout or is
    /// shutting down.
    pub fn enqueue(&self, task: SyncTask, timeout: Duration) -> bool {
        let state = self.state.lock().expect("sync queue mutex poisoned");
        let (mut state, _) = self
            .not_full
            .wait_timeout_while(state, timeout, |s| {
                !s.shutdown && s.heap.len() >= self.capacity
            })
            .expect("sync queue mutex poisoned");

        if state.shutdown || state.heap.len() >= self.capacity {
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(QueueEntry {
            priority: task.priority().ordinal(),
            seq,
            task,
        }));
        self.not_empty.notify_one();
        true
    }

    /// Removes the highest-priority task, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout, or once the queue is both empty and shut
    /// down.
    pub fn dequeue(&self, timeout: Duration) -> Option<SyncTask> {
        let state = self.state.lock().expect("sync queue mutex poisoned");
        let (mut state, _) = self
            .not_empty
            .wait_timeout_while(state, timeout, |s| s.heap.is_empty() && !s.shutdown)
            .expect("sync queue mutex poisoned");

        let Reverse(entry) = state.heap.pop()?;
        self.not_full.notify_one();
        Some(entry.task)
    }

    /// Flips the shutdown latch and wakes every waiter.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("sync queue mutex poisoned");
        state.shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().expect("sync queue mutex poisoned").shutdown
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("sync queue mutex poisoned").heap.len()
    }

    /// Returns `true` when no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity bound this queue was built with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}
