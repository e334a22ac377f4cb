//! Task records carried through the sync queue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide counter used to keep task ids unique.
static TASK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Priority levels for sync operations. Lower ordinal dequeues earlier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Priority {
    /// Essential operations reserved for operator use.
    Critical = 0,
    /// Recovery of interrupted transactions.
    High = 1,
    /// Regular change-driven sync work.
    Normal = 2,
    /// Reconciliation repairs and bulk operations.
    Low = 3,
    /// Periodic maintenance.
    Background = 4,
}

impl Priority {
    /// Returns the numeric ordinal used for queue ordering.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Background => "background",
        };
        f.write_str(name)
    }
}

/// Origin of a task. Only affects logging and metrics labels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TaskKind {
    /// Driven by a change notification.
    Sync,
    /// Re-driven from an orphaned journal entry.
    Recovery,
    /// Enqueued by the full-tree reconciliation pass.
    Reconciliation,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Sync => "sync",
            TaskKind::Recovery => "recovery",
            TaskKind::Reconciliation => "reconciliation",
        };
        f.write_str(name)
    }
}

/// A single unit of replication work: one source path to mirror.
#[derive(Clone, Debug)]
pub struct SyncTask {
    path: PathBuf,
    kind: TaskKind,
    priority: Priority,
    retry_count: u32,
    created_at: SystemTime,
    task_id: String,
}

impl SyncTask {
    /// Creates a task for `path` with a fresh unique id.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: TaskKind, priority: Priority) -> Self {
        Self {
            path: path.into(),
            kind,
            priority,
            retry_count: 0,
            created_at: SystemTime::now(),
            task_id: generate_task_id(),
        }
    }

    /// Builds the follow-up task for a failed attempt.
    ///
    /// The new task keeps the path, kind and priority of the original but
    /// carries its own id, a fresh creation time and an incremented retry
    /// count. Callers are responsible for enforcing the retry cap.
    #[must_use]
    pub fn retry(&self) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind,
            priority: self.priority,
            retry_count: self.retry_count + 1,
            created_at: SystemTime::now(),
            task_id: generate_task_id(),
        }
    }

    /// Absolute source path this task mirrors.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Origin of the task.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Scheduling priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Number of failed attempts preceding this task.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Wall-clock creation time.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Unique id of the form `{epoch_millis}-{counter}`.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

fn generate_task_id() -> String {
    let seq = TASK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{millis}-{seq}")
}
