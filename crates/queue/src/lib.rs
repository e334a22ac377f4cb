#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Bounded, blocking priority queue for file-synchronization tasks.
//!
//! The queue is the hand-off point between change producers (filesystem
//! events, recovery, reconciliation) and the worker pool that drains them.
//! It enforces back-pressure through a capacity bound with timed blocking
//! enqueue, strict priority ordering with a FIFO tie-break inside each
//! priority level, and a shutdown latch that refuses new work while letting
//! consumers drain whatever is already queued.
//!
//! All state lives behind a single mutex with two condition variables
//! (`not_empty`, `not_full`); producers and consumers only touch the state
//! while holding the lock.

mod sync_queue;
mod task;

pub use sync_queue::SyncQueue;
pub use task::{Priority, SyncTask, TaskKind};
