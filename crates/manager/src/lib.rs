#![deny(unsafe_code)]

//! The sync engine: turns change notifications into journaled, verified
//! copy operations.
//!
//! [`SyncManager`] owns the priority queue, the transaction journal and the
//! verifier for its lifetime. On [`start`](SyncManager::start) it launches a
//! fixed worker pool that drains the queue, one recovery thread that
//! re-drives orphaned journal entries, and one reconciliation thread that
//! periodically walks both trees and queues repairs for any drift. Workers
//! run the replication state machine: journal the intent, copy, verify,
//! journal the outcome, and retry with back-off on failure.
//!
//! External collaborators plug in through small traits: [`PathMapper`] maps
//! source paths to their mirror location, [`MetricsSink`] receives structured
//! counter events, and [`ChangeSource`] feeds filesystem change
//! notifications (a polling implementation is provided).

mod config;
mod context;
mod error;
mod mapper;
mod metrics;
mod reconcile;
mod recovery;
mod source;
mod sync_manager;
mod worker;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::{ManagerError, ManagerResult};
pub use mapper::{PathMapper, RootPathMapper};
pub use metrics::{MemorySink, MetricEvent, MetricsSink, NullSink, TracingSink};
pub use source::{ChangeSource, FsEvent, PollingChangeSource};
pub use sync_manager::SyncManager;

// Re-export the vocabulary types callers need alongside the manager.
pub use queue::{Priority, SyncTask, TaskKind};
pub use verify::VerifyMethod;
