//! Transaction records and their on-disk line format.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Replicated operation kinds, serialised as the integer codes of the wire
/// format (0=Copy, 1=Move, 2=Delete, 3=MetadataUpdate).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Copy the source file to the destination.
    Copy,
    /// Move the source file to the destination.
    Move,
    /// Remove the destination file.
    Delete,
    /// Re-apply metadata without touching content.
    MetadataUpdate,
}

impl Operation {
    /// Integer code used on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Operation::Copy => 0,
            Operation::Move => 1,
            Operation::Delete => 2,
            Operation::MetadataUpdate => 3,
        }
    }

    /// Decodes a wire code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Operation::Copy),
            1 => Some(Operation::Move),
            2 => Some(Operation::Delete),
            3 => Some(Operation::MetadataUpdate),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Copy => "copy",
            Operation::Move => "move",
            Operation::Delete => "delete",
            Operation::MetadataUpdate => "metadata-update",
        };
        f.write_str(name)
    }
}

/// Lifecycle states of a transaction, serialised as integer codes
/// (0=Pending, 1=InProgress, 2=Completed, 3=Failed, 4=RolledBack).
///
/// A transaction only moves forward along
/// `Pending → InProgress → {Completed | Failed | RolledBack}`; re-driving an
/// interrupted operation opens a new transaction under a new id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Recorded intent; work not yet started.
    Pending,
    /// The operation is being executed.
    InProgress,
    /// The operation finished and verified.
    Completed,
    /// The operation failed; `error_message` explains why.
    Failed,
    /// The operation was undone.
    RolledBack,
}

impl Status {
    /// Integer code used on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Status::Pending => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
            Status::Failed => 3,
            Status::RolledBack => 4,
        }
    }

    /// Decodes a wire code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::Pending),
            1 => Some(Status::InProgress),
            2 => Some(Status::Completed),
            3 => Some(Status::Failed),
            4 => Some(Status::RolledBack),
            _ => None,
        }
    }

    /// Whether the transaction still needs recovery attention.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Status::Pending | Status::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// One journal entry. The canonical store is the log file; in-memory copies
/// are advisory.
#[derive(Clone, Debug)]
pub struct TransactionRecord {
    /// Unique id of the form `tx-{epoch_millis}-{counter}`.
    pub id: String,
    /// What the transaction does.
    pub operation: Operation,
    /// Absolute source path.
    pub source_path: PathBuf,
    /// Absolute destination path; may be empty for deletes.
    pub dest_path: PathBuf,
    /// Current lifecycle state.
    pub status: Status,
    /// Wall-clock time of the last status change.
    pub timestamp: SystemTime,
    /// Failure reason; populated only for `Failed` and `RolledBack`.
    pub error_message: String,
    /// Optional content checksum carried across state changes.
    pub checksum: Option<String>,
}

impl TransactionRecord {
    /// Milliseconds since the Unix epoch of `timestamp`.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        system_time_to_millis(self.timestamp)
    }

    /// The trailing counter segment of the id, if it parses.
    #[must_use]
    pub fn id_counter(&self) -> Option<u64> {
        self.id.rsplit('-').next().and_then(|seq| seq.parse().ok())
    }
}

/// Wire representation: one JSON object per line, camelCase field names,
/// integer enum codes, millisecond timestamps.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordLine {
    pub id: String,
    pub operation: i64,
    pub source_path: String,
    pub dest_path: String,
    pub status: i64,
    pub timestamp: i64,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl From<&TransactionRecord> for RecordLine {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id.clone(),
            operation: record.operation.code(),
            source_path: record.source_path.to_string_lossy().into_owned(),
            dest_path: record.dest_path.to_string_lossy().into_owned(),
            status: record.status.code(),
            timestamp: record.timestamp_millis(),
            error_message: record.error_message.clone(),
            checksum: record.checksum.clone(),
        }
    }
}

impl TryFrom<RecordLine> for TransactionRecord {
    type Error = String;

    fn try_from(line: RecordLine) -> Result<Self, Self::Error> {
        let operation = Operation::from_code(line.operation)
            .ok_or_else(|| format!("unknown operation code {}", line.operation))?;
        let status = Status::from_code(line.status)
            .ok_or_else(|| format!("unknown status code {}", line.status))?;

        Ok(Self {
            id: line.id,
            operation,
            source_path: PathBuf::from(line.source_path),
            dest_path: PathBuf::from(line.dest_path),
            status,
            timestamp: millis_to_system_time(line.timestamp),
            error_message: line.error_message,
            checksum: line.checksum,
        })
    }
}

pub(crate) fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

pub(crate) fn millis_to_system_time(millis: i64) -> SystemTime {
    if millis >= 0 {
        UNIX_EPOCH + Duration::from_millis(millis as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis(millis.unsigned_abs())
    }
}
