//! Worker loop and the replication state machine.

use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use filetime::FileTime;
use journal::{Operation, Status};
use queue::SyncTask;
use tracing::{debug, warn};

use crate::context::EngineContext;

const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// Drains the queue until the engine stops.
pub(crate) fn worker_loop(context: &EngineContext) {
    while context.is_running() {
        let Some(task) = context.queue.dequeue(DEQUEUE_TIMEOUT) else {
            continue;
        };
        process_task(context, &task);

        // Advisory rotation at loop boundaries.
        if let Err(error) = context.journal.rotate_if_needed(context.config.rotation_size) {
            warn!(%error, "journal rotation failed");
        }
    }
}

/// Runs one task through the replication state machine:
/// journal `Pending` → `InProgress`, copy, verify, journal the outcome, and
/// schedule a retry with back-off when the attempt failed.
pub(crate) fn process_task(context: &EngineContext, task: &SyncTask) {
    let source = task.path();
    let dest = context.mapper.map(source);
    debug!(
        task = task.task_id(),
        kind = %task.kind(),
        source = %source.display(),
        dest = %dest.display(),
        "processing task"
    );

    let tx_id = match context
        .journal
        .log_transaction(Operation::Copy, source, &dest, None)
    {
        Ok(id) => id,
        Err(error) => {
            warn!(%error, source = %source.display(), "could not journal transaction");
            context.metrics.record("tx_log_failed", &source.display().to_string());
            return;
        }
    };
    context.metrics.record("tx_started", &tx_id);

    if let Err(error) = context.journal.update_status(&tx_id, Status::InProgress, None) {
        warn!(%error, tx = %tx_id, "could not mark transaction in progress");
        context.metrics.record("tx_log_failed", &tx_id);
        return;
    }

    let error_message = match copy_file(source, &dest) {
        Ok(()) => {
            let outcome = context
                .verifier
                .verify(source, &dest, context.config.verify_method);
            if outcome.matches {
                context.metrics.record("sync_verification", "success");
                match context.journal.update_status(&tx_id, Status::Completed, None) {
                    Ok(()) => context.metrics.record("tx_completed", &tx_id),
                    Err(error) => {
                        warn!(%error, tx = %tx_id, "could not mark transaction completed");
                        context.metrics.record("tx_log_failed", &tx_id);
                    }
                }
                return;
            }
            context.metrics.record(
                "sync_verification",
                &format!("failed: {}", outcome.error_message),
            );
            outcome.error_message
        }
        Err(error) => {
            context
                .metrics
                .record("sync_error", &format!("{error}: {}", source.display()));
            String::from("Sync operation failed")
        }
    };

    if let Err(error) = context
        .journal
        .update_status(&tx_id, Status::Failed, Some(&error_message))
    {
        warn!(%error, tx = %tx_id, "could not mark transaction failed");
        context.metrics.record("tx_log_failed", &tx_id);
    }
    context
        .metrics
        .record("tx_failed", &format!("{tx_id}: {error_message}"));

    if task.retry_count() < context.config.max_retries {
        let retry = task.retry();
        thread::sleep(context.config.retry_backoff);
        if context.queue.enqueue(retry, context.config.enqueue_timeout) {
            context.metrics.record("tx_retry", &tx_id);
        } else {
            context.metrics.record("tx_recovery_queue_failed", &tx_id);
        }
    }
}

/// Copies `source` over `dest`, creating parent directories and carrying the
/// source mtime onto the destination. `atime` is not preserved.
pub(crate) fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, dest)?;

    let source_meta = fs::metadata(source)?;
    filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&source_meta))?;
    Ok(())
}
