//! The append-only log file and its lifecycle.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::{JournalError, JournalResult};
use crate::record::{RecordLine, Status, TransactionRecord};
use crate::Operation;

/// Rotation threshold applied when callers pass no explicit limit: 10 MiB.
pub const DEFAULT_ROTATION_SIZE: u64 = 10 * 1024 * 1024;

const LOG_PREFIX: &str = "sync_log_";
const LOG_SUFFIX: &str = ".json";
const ARCHIVE_DIR: &str = "archive";

struct LogState {
    current_path: PathBuf,
    file: Option<File>,
    cache: HashMap<String, TransactionRecord>,
    next_id: u64,
}

/// Crash-consistent journal of replication transactions.
///
/// All operations are serialised behind one mutex guarding both the file
/// handle and the in-memory record cache. Appends write a complete
/// newline-terminated line and flush before returning, so the on-disk last
/// line for an id always defines its current status.
pub struct TransactionLog {
    log_dir: PathBuf,
    state: Mutex<LogState>,
}

impl TransactionLog {
    /// Prepares a log rooted at `log_dir`, creating the directory if needed.
    ///
    /// Selects the newest existing `sync_log_*.json` as the current file, or
    /// names a fresh one after the current time. No file is opened until
    /// [`open`](Self::open).
    pub fn new(log_dir: impl Into<PathBuf>) -> JournalResult<Self> {
        let log_dir = log_dir.into();
        fs::create_dir_all(&log_dir).map_err(|error| JournalError::io(&log_dir, error))?;

        let current_path = match newest_log_file(&log_dir)? {
            Some(existing) => existing,
            None => log_dir.join(fresh_log_name()),
        };
        debug!(path = %current_path.display(), "journal file selected");

        Ok(Self {
            log_dir,
            state: Mutex::new(LogState {
                current_path,
                file: None,
                cache: HashMap::new(),
                next_id: 1,
            }),
        })
    }

    /// Opens the current file for append and replays it into the cache.
    ///
    /// Idempotent: opening an already-open log only refreshes the cache.
    pub fn open(&self) -> JournalResult<()> {
        let mut state = self.lock();
        Self::ensure_open(&mut state)?;
        Self::replay(&mut state)
    }

    /// Flushes and releases the file handle.
    pub fn close(&self) {
        let mut state = self.lock();
        if let Some(mut file) = state.file.take() {
            if let Err(error) = file.flush() {
                warn!(%error, "flush on journal close failed");
            }
        }
    }

    /// Whether the log currently holds an open file handle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    /// Appends a new `Pending` transaction and returns its id.
    pub fn log_transaction(
        &self,
        operation: Operation,
        source_path: impl Into<PathBuf>,
        dest_path: impl Into<PathBuf>,
        checksum: Option<String>,
    ) -> JournalResult<String> {
        let mut state = self.lock();
        Self::ensure_open(&mut state)?;

        let id = Self::next_transaction_id(&mut state);
        let record = TransactionRecord {
            id: id.clone(),
            operation,
            source_path: source_path.into(),
            dest_path: dest_path.into(),
            status: Status::Pending,
            timestamp: SystemTime::now(),
            error_message: String::new(),
            checksum,
        };

        Self::append(&mut state, &record)?;
        Ok(id)
    }

    /// Appends a status change for `id`.
    ///
    /// The new line carries the record's unchanged fields plus the new
    /// status, a fresh timestamp, and `error_message` (cleared when `None`).
    /// Fails with [`JournalError::UnknownTransaction`] only if the id is
    /// still unknown after refreshing the cache from disk.
    pub fn update_status(
        &self,
        id: &str,
        status: Status,
        error_message: Option<&str>,
    ) -> JournalResult<()> {
        let mut state = self.lock();
        Self::ensure_open(&mut state)?;

        if !state.cache.contains_key(id) {
            Self::replay(&mut state)?;
        }
        let mut record = state
            .cache
            .get(id)
            .cloned()
            .ok_or_else(|| JournalError::UnknownTransaction(id.to_string()))?;

        record.status = status;
        record.timestamp = SystemTime::now();
        record.error_message = error_message.unwrap_or_default().to_string();

        Self::append(&mut state, &record)
    }

    /// Returns every transaction whose current status is `Pending` or
    /// `InProgress`, refreshed from disk.
    pub fn pending_transactions(&self) -> JournalResult<Vec<TransactionRecord>> {
        let mut state = self.lock();
        Self::replay(&mut state)?;

        let mut pending: Vec<_> = state
            .cache
            .values()
            .filter(|record| record.status.is_open())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pending)
    }

    /// Rotates the current file into `{log_dir}/archive/` once it exceeds
    /// `max_bytes`, then starts a fresh file.
    ///
    /// Returns `true` when a rotation happened. Rotation clears the record
    /// cache; archived records are no longer reachable through this API. The
    /// id counter is not reset, keeping ids unique across the log's lifetime.
    pub fn rotate_if_needed(&self, max_bytes: u64) -> JournalResult<bool> {
        let mut state = self.lock();

        let size = match fs::metadata(&state.current_path) {
            Ok(meta) => meta.len(),
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(false),
            Err(error) => return Err(JournalError::io(&state.current_path, error)),
        };
        if size <= max_bytes {
            return Ok(false);
        }

        if let Some(mut file) = state.file.take() {
            if let Err(error) = file.flush() {
                warn!(%error, "flush before rotation failed");
            }
        }

        let archive_dir = self.log_dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive_dir).map_err(|error| JournalError::io(&archive_dir, error))?;

        let file_name = state
            .current_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("sync_log_unnamed.json"));
        let archived = archive_dir.join(file_name);
        fs::rename(&state.current_path, &archived)
            .map_err(|error| JournalError::io(&state.current_path, error))?;
        debug!(path = %archived.display(), "journal rotated into archive");

        state.current_path = self.log_dir.join(fresh_log_name());
        state.cache.clear();
        Self::ensure_open(&mut state)?;
        Ok(true)
    }

    /// Number of distinct transactions in the current file's cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().cache.len()
    }

    /// Returns `true` when the current file holds no replayable records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the live log file.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.lock().current_path.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().expect("transaction log mutex poisoned")
    }

    fn ensure_open(state: &mut LogState) -> JournalResult<()> {
        if state.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&state.current_path)
            .map_err(|error| JournalError::io(&state.current_path, error))?;
        state.file = Some(file);
        Ok(())
    }

    fn next_transaction_id(state: &mut LogState) -> String {
        let seq = state.next_id;
        state.next_id += 1;
        let millis = crate::record::system_time_to_millis(SystemTime::now());
        format!("tx-{millis}-{seq}")
    }

    /// Appends one newline-terminated record line and flushes it to the OS.
    fn append(state: &mut LogState, record: &TransactionRecord) -> JournalResult<()> {
        let mut line = serde_json::to_string(&RecordLine::from(record))?;
        line.push('\n');

        let path = state.current_path.clone();
        let file = state.file.as_mut().expect("journal file opened by caller");
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|error| JournalError::io(path, error))?;

        state.cache.insert(record.id.clone(), record.clone());
        Ok(())
    }

    /// Rebuilds the cache and id counter from the current file.
    ///
    /// The last valid line per id wins. Lines that fail to parse are skipped
    /// with a warning; a trailing fragment without a newline is discarded
    /// silently, which is how a crash mid-append heals.
    fn replay(state: &mut LogState) -> JournalResult<()> {
        state.cache.clear();

        let content = match fs::read_to_string(&state.current_path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(JournalError::io(&state.current_path, error)),
        };

        let mut max_counter = 0u64;
        let mut rest = content.as_str();
        while let Some(newline) = rest.find('\n') {
            let line = &rest[..newline];
            rest = &rest[newline + 1..];
            if line.trim().is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<RecordLine>(line)
                .map_err(|error| error.to_string())
                .and_then(TransactionRecord::try_from);
            match parsed {
                Ok(record) => {
                    if let Some(counter) = record.id_counter() {
                        max_counter = max_counter.max(counter);
                    }
                    state.cache.insert(record.id.clone(), record);
                }
                Err(reason) => {
                    warn!(%reason, "skipping malformed journal line");
                }
            }
        }
        if !rest.is_empty() {
            debug!(bytes = rest.len(), "discarding partial journal tail");
        }

        state.next_id = state.next_id.max(max_counter + 1);
        Ok(())
    }
}

impl Drop for TransactionLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Picks the newest `sync_log_*.json` under `log_dir` by mtime, ties broken
/// by name.
fn newest_log_file(log_dir: &Path) -> JournalResult<Option<PathBuf>> {
    let entries = fs::read_dir(log_dir).map_err(|error| JournalError::io(log_dir, error))?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|error| JournalError::io(log_dir, error))?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(LOG_PREFIX) || !name.ends_with(LOG_SUFFIX) || !path.is_file() {
            continue;
        }

        let mtime = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &newest {
            Some((best_time, best_path)) => {
                mtime > *best_time || (mtime == *best_time && path > *best_path)
            }
            None => true,
        };
        if newer {
            newest = Some((mtime, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

fn fresh_log_name() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    format!("{LOG_PREFIX}{stamp}{LOG_SUFFIX}")
}
