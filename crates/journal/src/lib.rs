#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Append-only transaction journal for replicated file operations.
//!
//! Every intended and completed replication step is recorded as one
//! newline-terminated JSON object. The log is never edited in place: a status
//! change appends a fresh line, and the last valid line for an id is its
//! authoritative state. Recovery is therefore a full replay — scan the file,
//! keep the newest line per id, and restore the id counter from the highest
//! sequence number seen.
//!
//! A line interrupted mid-write (no trailing newline, or unparseable) is
//! discarded on the next open, which keeps the journal consistent across
//! process crashes.

mod error;
mod log;
mod record;

pub use error::{JournalError, JournalResult};
pub use log::{TransactionLog, DEFAULT_ROTATION_SIZE};
pub use record::{Operation, Status, TransactionRecord};
