//! Engine configuration.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use verify::VerifyMethod;

use crate::error::{ManagerError, ManagerResult};

/// Default journal location.
pub const DEFAULT_LOG_DIR: &str = "/var/log/file_sync";

/// Immutable engine configuration, shared by reference once the engine is
/// constructed. Build one through [`SyncConfig::builder`].
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Authoritative tree being mirrored.
    pub source_root: PathBuf,
    /// Mirror tree; repaired, never authoritative.
    pub dest_root: PathBuf,
    /// Directory holding the transaction journal.
    pub log_dir: PathBuf,
    /// Worker-pool size. Zero disables draining (back-pressure testing).
    pub num_threads: usize,
    /// Capacity bound of the task queue.
    pub queue_capacity: usize,
    /// Maximum retry attempts per task after the initial one.
    pub max_retries: u32,
    /// Time between full-tree reconciliation passes.
    pub reconcile_interval: Duration,
    /// Time between recovery scans of the journal.
    pub recovery_interval: Duration,
    /// Transactions younger than this are assumed still active.
    pub recovery_grace: Duration,
    /// Journal size that triggers rotation into the archive.
    pub rotation_size: u64,
    /// How long producers wait for queue room before giving up.
    pub enqueue_timeout: Duration,
    /// Delay before a failed task is re-queued.
    pub retry_backoff: Duration,
    /// Comparison method used after copies and during reconciliation.
    pub verify_method: VerifyMethod,
}

impl SyncConfig {
    /// Starts a builder for the given source and destination roots.
    pub fn builder(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
    ) -> SyncConfigBuilder {
        SyncConfigBuilder::new(source_root, dest_root)
    }
}

/// Builder for [`SyncConfig`]; unset options take their documented defaults.
#[derive(Clone, Debug)]
pub struct SyncConfigBuilder {
    source_root: PathBuf,
    dest_root: PathBuf,
    log_dir: PathBuf,
    num_threads: usize,
    queue_capacity: usize,
    max_retries: u32,
    reconcile_interval: Duration,
    recovery_interval: Duration,
    recovery_grace: Duration,
    rotation_size: u64,
    enqueue_timeout: Duration,
    retry_backoff: Duration,
    verify_method: VerifyMethod,
}

impl SyncConfigBuilder {
    fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            num_threads: default_num_threads(),
            queue_capacity: 10_000,
            max_retries: 3,
            reconcile_interval: Duration::from_secs(6 * 60 * 60),
            recovery_interval: Duration::from_secs(60),
            recovery_grace: Duration::from_secs(5 * 60),
            rotation_size: journal::DEFAULT_ROTATION_SIZE,
            enqueue_timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(5),
            verify_method: VerifyMethod::FastHash,
        }
    }

    /// Overrides the journal directory.
    #[must_use]
    pub fn log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Sets the worker-pool size. Zero is accepted and disables draining.
    #[must_use]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Sets the queue capacity bound.
    #[must_use]
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the retry cap.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the reconciliation cadence.
    #[must_use]
    pub fn reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Sets the recovery-scan cadence.
    #[must_use]
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }

    /// Sets the age below which a transaction is assumed still active.
    #[must_use]
    pub fn recovery_grace(mut self, grace: Duration) -> Self {
        self.recovery_grace = grace;
        self
    }

    /// Sets the journal rotation threshold in bytes.
    #[must_use]
    pub fn rotation_size(mut self, rotation_size: u64) -> Self {
        self.rotation_size = rotation_size;
        self
    }

    /// Sets how long producers wait for queue room.
    #[must_use]
    pub fn enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Sets the delay before a failed task is re-queued.
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the verification method.
    #[must_use]
    pub fn verify_method(mut self, method: VerifyMethod) -> Self {
        self.verify_method = method;
        self
    }

    /// Validates the options and produces the configuration.
    pub fn build(self) -> ManagerResult<SyncConfig> {
        if self.source_root.as_os_str().is_empty() {
            return Err(ManagerError::InvalidConfig("source root is empty".into()));
        }
        if self.dest_root.as_os_str().is_empty() {
            return Err(ManagerError::InvalidConfig("destination root is empty".into()));
        }
        if self.source_root == self.dest_root {
            return Err(ManagerError::InvalidConfig(
                "source and destination roots must differ".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ManagerError::InvalidConfig("queue capacity must be at least 1".into()));
        }

        Ok(SyncConfig {
            source_root: self.source_root,
            dest_root: self.dest_root,
            log_dir: self.log_dir,
            num_threads: self.num_threads,
            queue_capacity: self.queue_capacity,
            max_retries: self.max_retries,
            reconcile_interval: self.reconcile_interval,
            recovery_interval: self.recovery_interval,
            recovery_grace: self.recovery_grace,
            rotation_size: self.rotation_size,
            enqueue_timeout: self.enqueue_timeout,
            retry_backoff: self.retry_backoff,
            verify_method: self.verify_method,
        })
    }
}

fn default_num_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = SyncConfig::builder("/data/src", "/data/dst").build().expect("config");

        assert_eq!(config.log_dir, PathBuf::from("/var/log/file_sync"));
        assert!(config.num_threads >= 1);
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.reconcile_interval, Duration::from_secs(21_600));
        assert_eq!(config.recovery_interval, Duration::from_secs(60));
        assert_eq!(config.recovery_grace, Duration::from_secs(300));
        assert_eq!(config.rotation_size, 10 * 1024 * 1024);
        assert_eq!(config.enqueue_timeout, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
        assert_eq!(config.verify_method, VerifyMethod::FastHash);
    }

    #[test]
    fn builder_overrides_stick() {
        let config = SyncConfig::builder("/a", "/b")
            .log_dir("/tmp/journal")
            .num_threads(0)
            .queue_capacity(2)
            .max_retries(1)
            .recovery_interval(Duration::from_millis(200))
            .recovery_grace(Duration::ZERO)
            .reconcile_interval(Duration::from_secs(1))
            .rotation_size(1024)
            .enqueue_timeout(Duration::from_millis(50))
            .retry_backoff(Duration::ZERO)
            .verify_method(VerifyMethod::StrongHash)
            .build()
            .expect("config");

        assert_eq!(config.num_threads, 0);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.recovery_grace, Duration::ZERO);
        assert_eq!(config.verify_method, VerifyMethod::StrongHash);
    }

    #[test]
    fn identical_roots_are_rejected() {
        let result = SyncConfig::builder("/same", "/same").build();
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
    }

    #[test]
    fn empty_roots_and_zero_capacity_are_rejected() {
        assert!(SyncConfig::builder("", "/b").build().is_err());
        assert!(SyncConfig::builder("/a", "").build().is_err());
        assert!(SyncConfig::builder("/a", "/b").queue_capacity(0).build().is_err());
    }
}
