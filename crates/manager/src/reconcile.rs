//! Reconciliation worker: periodic full-tree verification and repair.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use queue::{Priority, SyncTask, TaskKind};
use tracing::{debug, warn};

use crate::context::EngineContext;

/// Runs a full consistency check every `reconcile_interval`, or immediately
/// when one has been requested through the engine's one-shot flag.
pub(crate) fn reconcile_loop(context: &EngineContext) {
    while context.is_running() {
        if !wait_for_trigger(context) {
            break;
        }
        context
            .consistency_check_requested
            .store(false, Ordering::SeqCst);
        run_consistency_check(context);
    }
}

/// Waits until the interval elapses or a check is requested. Returns `false`
/// once the engine stops.
fn wait_for_trigger(context: &EngineContext) -> bool {
    let deadline = Instant::now() + context.config.reconcile_interval;
    while context.is_running() {
        if context.consistency_check_requested.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
    false
}

/// Walks both trees and queues a low-priority repair task for every
/// mismatched relative path.
pub(crate) fn run_consistency_check(context: &EngineContext) {
    context.metrics.record("consistency_check", "started");

    let threads = context.config.num_threads.max(1);
    let results = context.verifier.verify_directory(
        &context.config.source_root,
        &context.config.dest_root,
        context.config.verify_method,
        true,
        threads,
    );

    // A single result with an empty relative path means the walk itself
    // failed (missing or non-directory root).
    if let [(relative, outcome)] = results.as_slice() {
        if relative.as_os_str().is_empty() && !outcome.matches {
            warn!(reason = %outcome.error_message, "consistency check aborted");
            context
                .metrics
                .record("consistency_check_error", &outcome.error_message);
            return;
        }
    }

    let mut total = 0usize;
    let mut mismatches = 0usize;
    for (relative, outcome) in results {
        total += 1;
        if outcome.matches {
            continue;
        }
        mismatches += 1;
        context
            .metrics
            .record("consistency_mismatch", &relative.display().to_string());

        let source_path = context.config.source_root.join(&relative);
        let task = SyncTask::new(source_path, TaskKind::Reconciliation, Priority::Low);
        if !context.queue.enqueue(task, context.config.enqueue_timeout) {
            // Queue full: the mismatch will be rediscovered next pass.
            debug!(path = %relative.display(), "repair task dropped, queue full");
        }
    }

    context.metrics.record(
        "consistency_check_complete",
        &format!("Files={total}, Mismatches={mismatches}"),
    );
}
