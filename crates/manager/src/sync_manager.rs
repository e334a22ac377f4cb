//! The engine facade: thread lifecycle and the public API.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use journal::TransactionLog;
use queue::{Priority, SyncQueue, SyncTask, TaskKind};
use tracing::{debug, warn};
use verify::Verifier;

use crate::config::SyncConfig;
use crate::context::EngineContext;
use crate::error::ManagerResult;
use crate::mapper::{PathMapper, RootPathMapper};
use crate::metrics::{MetricsSink, NullSink};
use crate::{reconcile, recovery, worker};

/// Orchestrates mirroring: owns the queue, journal and verifier, and runs
/// the worker pool plus the recovery and reconciliation threads.
///
/// `start` and `stop` are idempotent; `stop` shuts the queue down, joins
/// every thread unconditionally and closes the journal. A stopped manager
/// stays stopped — build a new one to mirror again.
pub struct SyncManager {
    context: Arc<EngineContext>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: Mutex<()>,
}

impl SyncManager {
    /// Builds a manager with the default path mapper (root prefix
    /// replacement) and no metrics sink.
    pub fn new(config: SyncConfig) -> ManagerResult<Self> {
        let mapper = RootPathMapper::new(&config.source_root, &config.dest_root);
        Self::with_parts(config, Box::new(mapper), Box::new(NullSink))
    }

    /// Builds a manager with caller-supplied mapper and metrics sink.
    pub fn with_parts(
        config: SyncConfig,
        mapper: Box<dyn PathMapper>,
        metrics: Box<dyn MetricsSink>,
    ) -> ManagerResult<Self> {
        let journal = TransactionLog::new(&config.log_dir)?;

        Ok(Self {
            context: Arc::new(EngineContext {
                queue: SyncQueue::with_capacity(config.queue_capacity),
                journal,
                verifier: Verifier::new(),
                mapper,
                metrics,
                running: AtomicBool::new(false),
                consistency_check_requested: AtomicBool::new(false),
                config,
            }),
            threads: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(()),
        })
    }

    /// Opens the journal and launches the engine threads.
    ///
    /// Fatal if the journal cannot be opened. Calling `start` on a running
    /// manager is a no-op.
    pub fn start(&self) -> ManagerResult<()> {
        let _lifecycle = self.lifecycle.lock().expect("lifecycle mutex poisoned");
        if self.context.is_running() {
            return Ok(());
        }

        self.context.journal.open()?;
        self.context.running.store(true, Ordering::SeqCst);

        let mut threads = self.threads.lock().expect("thread registry mutex poisoned");
        for index in 0..self.context.config.num_threads {
            let context = Arc::clone(&self.context);
            threads.push(spawn_named(format!("sync-worker-{index}"), move || {
                worker::worker_loop(&context);
            }));
        }
        {
            let context = Arc::clone(&self.context);
            threads.push(spawn_named("sync-recovery".into(), move || {
                recovery::recovery_loop(&context);
            }));
        }
        {
            let context = Arc::clone(&self.context);
            threads.push(spawn_named("sync-reconcile".into(), move || {
                reconcile::reconcile_loop(&context);
            }));
        }

        self.context.metrics.record("sync_manager", "started");
        debug!(
            workers = self.context.config.num_threads,
            "sync manager started"
        );
        Ok(())
    }

    /// Stops the engine: flips the running flag, shuts the queue down,
    /// joins every thread and closes the journal. Queued tasks are dropped;
    /// reconciliation rediscovers them. Idempotent.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().expect("lifecycle mutex poisoned");
        if !self.context.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.context.queue.shutdown();

        let threads = {
            let mut registry = self.threads.lock().expect("thread registry mutex poisoned");
            std::mem::take(&mut *registry)
        };
        for handle in threads {
            if let Err(panic) = handle.join() {
                warn!(?panic, "engine thread panicked");
            }
        }

        self.context.journal.close();
        self.context.metrics.record("sync_manager", "stopped");
        debug!("sync manager stopped");
    }

    /// Queues `path` for mirroring at the given priority.
    ///
    /// Returns `false` when the manager is not running or the queue stayed
    /// full past the configured enqueue timeout.
    pub fn sync_file(&self, path: impl AsRef<Path>, priority: Priority) -> bool {
        let path = path.as_ref();
        if !self.context.is_running() {
            return false;
        }

        let task = SyncTask::new(path, TaskKind::Sync, priority);
        let queued = self
            .context
            .queue
            .enqueue(task, self.context.config.enqueue_timeout);

        let label = path.display().to_string();
        if queued {
            self.context.metrics.record("file_queued", &label);
        } else {
            self.context.metrics.record("file_queue_failed", &label);
        }
        queued
    }

    /// Queues a batch of paths; returns `true` only if every path was
    /// accepted.
    pub fn batch_sync(&self, paths: &[impl AsRef<Path>], priority: Priority) -> bool {
        if !self.context.is_running() {
            return false;
        }

        let mut all_queued = true;
        for path in paths {
            if !self.sync_file(path, priority) {
                all_queued = false;
            }
        }
        all_queued
    }

    /// Requests an immediate consistency check from the reconciliation
    /// thread.
    pub fn perform_consistency_check(&self) {
        self.context
            .consistency_check_requested
            .store(true, Ordering::SeqCst);
    }

    /// Whether the engine threads are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.context.queue.len()
    }

    /// Number of transactions the journal currently shows as open.
    #[must_use]
    pub fn pending_transaction_count(&self) -> usize {
        self.context
            .journal
            .pending_transactions()
            .map(|pending| pending.len())
            .unwrap_or(0)
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_named(name: String, body: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name)
        .spawn(body)
        .expect("failed to spawn engine thread")
}
