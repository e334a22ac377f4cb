//! Shared state handed to every engine thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use journal::TransactionLog;
use queue::SyncQueue;
use verify::Verifier;

use crate::config::SyncConfig;
use crate::mapper::PathMapper;
use crate::metrics::MetricsSink;

/// Everything a worker, recovery or reconciliation thread needs.
///
/// The manager owns this behind an `Arc` and joins every thread before
/// dropping it, so threads never hold the engine's lifetime — only the
/// subsystems they use.
pub(crate) struct EngineContext {
    pub config: SyncConfig,
    pub queue: SyncQueue,
    pub journal: TransactionLog,
    pub verifier: Verifier,
    pub mapper: Box<dyn PathMapper>,
    pub metrics: Box<dyn MetricsSink>,
    pub running: AtomicBool,
    pub consistency_check_requested: AtomicBool,
}

impl EngineContext {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sleeps for `total` in short slices, returning early (`false`) once
    /// the engine stops. Keeps shutdown latency bounded by the slice width
    /// rather than the full interval.
    pub fn sleep_while_running(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let remaining = deadline - now;
            std::thread::sleep(remaining.min(Duration::from_millis(100)));
        }
        false
    }
}
