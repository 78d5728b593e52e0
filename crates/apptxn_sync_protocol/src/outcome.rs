//! Classification of remote responses.

/// HTTP status the remote uses to signal transient unavailability.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// How the remote store answered one flush request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The remote stored the transaction.
    Acknowledged,
    /// The remote is temporarily unavailable.
    ServerBusy,
    /// Anything else: network failure or a non-busy, non-success status.
    Failed(String),
}

impl RemoteOutcome {
    /// Returns true for [`RemoteOutcome::Acknowledged`].
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, RemoteOutcome::Acknowledged)
    }
}

/// Classifies an HTTP status code.
pub fn classify_status(status: u16) -> RemoteOutcome {
    match status {
        200..=299 => RemoteOutcome::Acknowledged,
        SERVICE_UNAVAILABLE => RemoteOutcome::ServerBusy,
        other => RemoteOutcome::Failed(format!("unexpected status {other}")),
    }
}
