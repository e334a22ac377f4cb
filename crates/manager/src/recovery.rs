//! Recovery worker: re-drives transactions the journal shows as unfinished.

use std::time::SystemTime;

use journal::{JournalResult, Status, TransactionRecord};
use queue::{Priority, SyncTask, TaskKind};
use tracing::{debug, warn};

use crate::context::EngineContext;

/// Periodically scans the journal for orphaned `Pending`/`InProgress`
/// entries and queues them for re-execution.
pub(crate) fn recovery_loop(context: &EngineContext) {
    while context.is_running() {
        if !context.sleep_while_running(context.config.recovery_interval) {
            break;
        }
        if let Err(error) = recovery_pass(context) {
            warn!(%error, "recovery pass failed");
            context.metrics.record("recovery_error", &error.to_string());
        }
    }
}

/// One scan over the journal's open transactions.
pub(crate) fn recovery_pass(context: &EngineContext) -> JournalResult<()> {
    let pending = context.journal.pending_transactions()?;
    if pending.is_empty() {
        return Ok(());
    }
    context.metrics.record(
        "recovery_started",
        &format!("found {} transactions", pending.len()),
    );

    for tx in pending {
        if !context.is_running() {
            break;
        }
        recover_transaction(context, &tx);
    }
    Ok(())
}

fn recover_transaction(context: &EngineContext, tx: &TransactionRecord) {
    // Young transactions are assumed to still be in flight on a worker.
    let age = SystemTime::now()
        .duration_since(tx.timestamp)
        .unwrap_or_default();
    if age < context.config.recovery_grace {
        debug!(tx = %tx.id, "transaction within grace period, skipping");
        return;
    }

    context.metrics.record("tx_recovery_attempt", &tx.id);

    if !tx.source_path.exists() {
        if let Err(error) = context.journal.update_status(
            &tx.id,
            Status::Failed,
            Some("Source file no longer exists"),
        ) {
            warn!(%error, tx = %tx.id, "could not fail vanished-source transaction");
        }
        context
            .metrics
            .record("tx_recovery_failed", &format!("{}: source missing", tx.id));
        return;
    }

    let task = SyncTask::new(&tx.source_path, TaskKind::Recovery, Priority::High);
    if context.queue.enqueue(task, context.config.enqueue_timeout) {
        context.metrics.record("tx_recovery_queued", &tx.id);
    } else {
        context.metrics.record("tx_recovery_queue_failed", &tx.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::mapper::RootPathMapper;
    use crate::metrics::{MemorySink, MetricsSink};
    use journal::{Operation, TransactionLog};
    use queue::SyncQueue;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use verify::Verifier;

    struct SharedSink(Arc<MemorySink>);

    impl MetricsSink for SharedSink {
        fn record(&self, name: &str, value: &str) {
            self.0.record(name, value);
        }
    }

    fn context_with_grace(dir: &TempDir, grace: Duration) -> (EngineContext, Arc<MemorySink>) {
        let source_root = dir.path().join("src");
        let dest_root = dir.path().join("dst");
        fs::create_dir_all(&source_root).expect("mkdir");
        fs::create_dir_all(&dest_root).expect("mkdir");

        let config = SyncConfig::builder(&source_root, &dest_root)
            .log_dir(dir.path().join("journal"))
            .recovery_grace(grace)
            .enqueue_timeout(Duration::from_millis(100))
            .build()
            .expect("config");

        let journal = TransactionLog::new(&config.log_dir).expect("journal");
        journal.open().expect("open journal");

        let metrics = Arc::new(MemorySink::new());
        let context = EngineContext {
            queue: SyncQueue::with_capacity(config.queue_capacity),
            journal,
            verifier: Verifier::new(),
            mapper: Box::new(RootPathMapper::new(&source_root, &dest_root)),
            metrics: Box::new(SharedSink(Arc::clone(&metrics))),
            running: AtomicBool::new(true),
            consistency_check_requested: AtomicBool::new(false),
            config,
        };
        (context, metrics)
    }

    #[test]
    fn orphaned_transaction_with_live_source_is_requeued_high() {
        let dir = TempDir::new().expect("tempdir");
        let (context, metrics) = context_with_grace(&dir, Duration::ZERO);

        let source = dir.path().join("src/stuck.txt");
        fs::write(&source, b"stuck").expect("write");
        let id = context
            .journal
            .log_transaction(Operation::Copy, &source, dir.path().join("dst/stuck.txt"), None)
            .expect("log");
        context
            .journal
            .update_status(&id, Status::InProgress, None)
            .expect("update");

        recovery_pass(&context).expect("pass");

        assert_eq!(metrics.count_of("recovery_started"), 1);
        assert_eq!(metrics.values_of("tx_recovery_attempt"), vec![id.clone()]);
        assert_eq!(metrics.values_of("tx_recovery_queued"), vec![id]);

        let task = context
            .queue
            .dequeue(Duration::from_millis(50))
            .expect("recovery task");
        assert_eq!(task.kind(), TaskKind::Recovery);
        assert_eq!(task.priority(), Priority::High);
        assert_eq!(task.path(), source.as_path());
    }

    #[test]
    fn vanished_source_is_terminally_failed() {
        let dir = TempDir::new().expect("tempdir");
        let (context, metrics) = context_with_grace(&dir, Duration::ZERO);

        let gone = dir.path().join("src/gone.txt");
        let id = context
            .journal
            .log_transaction(Operation::Copy, &gone, dir.path().join("dst/gone.txt"), None)
            .expect("log");

        recovery_pass(&context).expect("pass");

        assert_eq!(metrics.count_of("tx_recovery_failed"), 1);
        assert!(context.queue.is_empty());

        let pending = context.journal.pending_transactions().expect("pending");
        assert!(pending.iter().all(|record| record.id != id));
    }

    #[test]
    fn young_transactions_are_left_alone() {
        let dir = TempDir::new().expect("tempdir");
        let (context, metrics) = context_with_grace(&dir, Duration::from_secs(300));

        let source = dir.path().join("src/fresh.txt");
        fs::write(&source, b"fresh").expect("write");
        context
            .journal
            .log_transaction(Operation::Copy, &source, dir.path().join("dst/fresh.txt"), None)
            .expect("log");

        recovery_pass(&context).expect("pass");

        assert_eq!(metrics.count_of("recovery_started"), 1);
        assert_eq!(metrics.count_of("tx_recovery_attempt"), 0);
        assert!(context.queue.is_empty());
    }

    #[test]
    fn quiet_journal_emits_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let (context, metrics) = context_with_grace(&dir, Duration::ZERO);

        recovery_pass(&context).expect("pass");
        assert_eq!(metrics.count_of("recovery_started"), 0);
    }
}
