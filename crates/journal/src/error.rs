//! Journal error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors surfaced by the transaction log.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Filesystem access to the journal failed.
    #[error("journal I/O error on '{path}': {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying error from the operating system.
        #[source]
        source: io::Error,
    },
    /// A record could not be encoded for appending.
    #[error("failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),
    /// A status update referenced an id with no line in the current log.
    #[error("unknown transaction id '{0}'")]
    UnknownTransaction(String),
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
