//! Error types for apptxn core.

use crate::model::LocalId;
use apptxn_storage::{StoreError, GENERIC_ERROR_CODE};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in apptxn core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A local store operation failed.
    #[error("local persistence error: {0}")]
    Store(#[from] StoreError),

    /// The transaction does not exist in the local store.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(LocalId),

    /// The data file was written by a newer schema.
    #[error("unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Version found in the data file.
        found: i64,
        /// Highest version this build understands.
        supported: i64,
    },

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns the numeric error code (the engine code for store failures).
    pub fn code(&self) -> i32 {
        match self {
            CoreError::Store(err) => err.code(),
            _ => GENERIC_ERROR_CODE,
        }
    }

    /// Returns the error description.
    pub fn description(&self) -> String {
        match self {
            CoreError::Store(err) => err.description(),
            other => other.to_string(),
        }
    }

    /// Returns true if this is a local persistence failure.
    pub fn is_persistence(&self) -> bool {
        matches!(self, CoreError::Store(_))
    }
}
