//! Error types for store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Code reported for failures that did not originate inside the SQL engine
/// (matches SQLite's generic `SQLITE_ERROR`).
pub const GENERIC_ERROR_CODE: i32 = 1;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQL engine rejected or failed a statement.
    #[error("sqlite error {code}: {description}")]
    Sqlite {
        /// Extended SQLite result code.
        code: i32,
        /// Engine-provided description.
        description: String,
        /// The native engine error.
        #[source]
        source: rusqlite::Error,
    },

    /// A table or column name is not a plain SQL identifier.
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Where-columns and where-values have different lengths.
    #[error("argument mismatch: {columns} where-columns but {values} where-values")]
    ArgumentMismatch {
        /// Number of where-columns supplied.
        columns: usize,
        /// Number of where-values supplied.
        values: usize,
    },

    /// The data file does not exist and creation was disabled.
    #[error("data file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An I/O error occurred while preparing the data file location.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Returns the numeric error code.
    ///
    /// Engine failures report the extended SQLite result code; everything else
    /// reports [`GENERIC_ERROR_CODE`].
    pub fn code(&self) -> i32 {
        match self {
            StoreError::Sqlite { code, .. } => *code,
            _ => GENERIC_ERROR_CODE,
        }
    }

    /// Returns the human-readable error description.
    pub fn description(&self) -> String {
        match self {
            StoreError::Sqlite { description, .. } => description.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the engine refused the statement because of a
    /// constraint (foreign key, unique, not-null).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite {
                source: rusqlite::Error::SqliteFailure(failure, _),
                ..
            } if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(source: rusqlite::Error) -> Self {
        let (code, description) = match &source {
            rusqlite::Error::SqliteFailure(failure, message) => (
                failure.extended_code,
                message.clone().unwrap_or_else(|| failure.to_string()),
            ),
            other => (GENERIC_ERROR_CODE, other.to_string()),
        };
        StoreError::Sqlite {
            code,
            description,
            source,
        }
    }
}
