//! Manager error types.

use journal::JournalError;
use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can keep the sync engine from being built or started.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The transaction log could not be prepared or opened. Fatal at
    /// startup: the engine refuses to run without a journal.
    #[error("transaction log unavailable: {0}")]
    Journal(#[from] JournalError),
}
