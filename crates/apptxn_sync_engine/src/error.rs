//! Error types for the flush engine.

use apptxn_core::CoreError;
use apptxn_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for flush operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during flush operations.
///
/// Busy and other non-success remote responses are not errors; they are
/// reported through [`crate::FlushReport`] and the busy callback.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A local store operation failed.
    #[error("local persistence error: {0}")]
    Core(#[from] CoreError),

    /// The request could not be built or encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the exchange can be retried.
        retryable: bool,
    },

    /// No auth token has been set, so nothing can be sent.
    #[error("no auth token set")]
    NotAuthenticated,

    /// The recurring flush task could not be started.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns true if this is a local persistence failure.
    pub fn is_persistence(&self) -> bool {
        matches!(self, SyncError::Core(err) if err.is_persistence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apptxn_storage::StoreError;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(!SyncError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn persistence_errors() {
        let err = SyncError::from(CoreError::from(StoreError::InvalidIdentifier("x".into())));
        assert!(err.is_persistence());
        assert!(err.to_string().starts_with("local persistence error"));
        assert!(!SyncError::NotAuthenticated.is_persistence());
    }
}
