//! Integration test helpers for engine-level end-to-end testing.
//!
//! Provides a temporary source/destination/journal layout, metric and
//! mapper test doubles, and polling helpers for asynchronous assertions.

#![allow(dead_code)] // Helpers are shared across independent test binaries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use manager::{MemorySink, MetricsSink, PathMapper, RootPathMapper, SyncConfig, SyncConfigBuilder};

/// Temporary mirror layout: `src/`, `dst/` and `journal/` under one root.
pub struct MirrorDirs {
    dir: tempfile::TempDir,
}

impl MirrorDirs {
    /// Creates the layout with empty source and destination trees.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::TempDir::new()?;
        fs::create_dir_all(dir.path().join("src"))?;
        fs::create_dir_all(dir.path().join("dst"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_root(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn dest_root(&self) -> PathBuf {
        self.dir.path().join("dst")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("journal")
    }

    /// Writes a file under the source tree, creating parents.
    pub fn write_source(&self, relative: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.source_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Writes a file under the destination tree, creating parents.
    pub fn write_dest(&self, relative: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.dest_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Config pre-tuned for tests: compressed intervals, zero retry
    /// back-off, two workers.
    pub fn config(&self) -> SyncConfigBuilder {
        SyncConfig::builder(self.source_root(), self.dest_root())
            .log_dir(self.log_dir())
            .num_threads(2)
            .retry_backoff(Duration::ZERO)
            .enqueue_timeout(Duration::from_millis(200))
            .recovery_interval(Duration::from_secs(120))
            .reconcile_interval(Duration::from_secs(600))
    }

    /// Every parsed line of the live journal files, in append order.
    pub fn journal_lines(&self) -> Vec<serde_json::Value> {
        let Ok(entries) = fs::read_dir(self.log_dir()) else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with("sync_log_") || !name.ends_with(".json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            for line in content.lines() {
                if let Ok(value) = serde_json::from_str(line) {
                    lines.push(value);
                }
            }
        }
        lines
    }

    /// Journal lines carrying the given integer status code.
    pub fn journal_lines_with_status(&self, status: i64) -> Vec<serde_json::Value> {
        self.journal_lines()
            .into_iter()
            .filter(|line| line["status"].as_i64() == Some(status))
            .collect()
    }
}

/// Metrics sink that forwards into a shared [`MemorySink`], so tests keep a
/// handle after the manager takes ownership of its boxed copy.
pub struct SharedSink(pub Arc<MemorySink>);

impl MetricsSink for SharedSink {
    fn record(&self, name: &str, value: &str) {
        self.0.record(name, value);
    }
}

/// Creates a shared memory sink plus the boxed forwarder to hand to the
/// manager.
pub fn shared_metrics() -> (Arc<MemorySink>, Box<dyn MetricsSink>) {
    let sink = Arc::new(MemorySink::new());
    let forwarder = Box::new(SharedSink(Arc::clone(&sink)));
    (sink, forwarder)
}

/// Mapper double that misroutes its first `failures` calls into a path
/// whose parent is a regular file, making the copy fail exactly that many
/// times before behaving normally.
pub struct FlakyMapper {
    inner: RootPathMapper,
    blocked: PathBuf,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyMapper {
    /// Builds the mapper and plants the blocking file under `dirs`.
    pub fn new(dirs: &MirrorDirs, failures: usize) -> io::Result<Self> {
        let blocked = dirs.root().join("blocked");
        fs::write(&blocked, b"not a directory")?;
        Ok(Self {
            inner: RootPathMapper::new(dirs.source_root(), dirs.dest_root()),
            blocked,
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of mapping calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PathMapper for FlakyMapper {
    fn map(&self, source_path: &Path) -> PathBuf {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            self.blocked.join("unreachable")
        } else {
            self.inner.map(source_path)
        }
    }
}

/// Polls `predicate` every 10 ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
