//! Transaction and transaction-log snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-generated identifier of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(i64);

impl LocalId {
    /// Wraps a raw row id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-generated identifier of a transaction log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(i64);

impl LogId {
    /// Wraps a raw row id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from epoch milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Returns epoch milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

/// Device metadata captured when a transaction is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device make / model.
    pub make: String,
    /// Operating system name.
    pub os: String,
    /// Operating system version.
    pub os_version: String,
}

impl DeviceInfo {
    /// Creates device metadata.
    pub fn new(make: impl Into<String>, os: impl Into<String>, os_version: impl Into<String>) -> Self {
        Self {
            make: make.into(),
            os: os.into(),
            os_version: os_version.into(),
        }
    }
}

/// An event to be logged against a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Use-case event tag.
    pub usecase_event: i64,
    /// In-context error code (error events only).
    pub err_code: Option<i64>,
    /// In-context error description (error events only).
    pub err_description: Option<String>,
}

impl LogEvent {
    /// A plain event.
    pub fn new(usecase_event: i64) -> Self {
        Self {
            usecase_event,
            err_code: None,
            err_description: None,
        }
    }

    /// An error event carrying the error that occurred in context.
    pub fn error(usecase_event: i64, err_code: i64, err_description: impl Into<String>) -> Self {
        Self {
            usecase_event,
            err_code: Some(err_code),
            err_description: Some(err_description.into()),
        }
    }
}

/// A persisted transaction log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLog {
    pub(crate) id: LogId,
    pub(crate) parent_transaction_id: LocalId,
    pub(crate) timestamp: Timestamp,
    pub(crate) usecase_event: i64,
    pub(crate) in_context_err_code: Option<i64>,
    pub(crate) in_context_err_description: Option<String>,
}

impl TransactionLog {
    /// Row id.
    pub fn id(&self) -> LogId {
        self.id
    }

    /// Id of the owning transaction.
    pub fn parent_transaction_id(&self) -> LocalId {
        self.parent_transaction_id
    }

    /// Time the row was persisted.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Use-case event tag.
    pub fn usecase_event(&self) -> i64 {
        self.usecase_event
    }

    /// In-context error code, if this is an error event.
    pub fn in_context_err_code(&self) -> Option<i64> {
        self.in_context_err_code
    }

    /// In-context error description, if this is an error event.
    pub fn in_context_err_description(&self) -> Option<&str> {
        self.in_context_err_description.as_deref()
    }

    /// Returns true if the row carries in-context error details.
    pub fn is_error(&self) -> bool {
        self.in_context_err_code.is_some() || self.in_context_err_description.is_some()
    }
}

/// A persisted transaction and the logs it had when it was fetched.
///
/// Instances are snapshots produced by [`crate::TransactionRepository`]; logging
/// new events does not update an existing snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub(crate) local_id: LocalId,
    pub(crate) guid: String,
    pub(crate) usecase: i64,
    pub(crate) device: DeviceInfo,
    pub(crate) logs: Vec<TransactionLog>,
}

impl Transaction {
    /// Store-generated id.
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    /// Globally unique identifier.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Business use-case tag.
    pub fn usecase(&self) -> i64 {
        self.usecase
    }

    /// Device metadata captured at creation.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Device make / model.
    pub fn user_agent_device_make(&self) -> &str {
        &self.device.make
    }

    /// Device OS name.
    pub fn user_agent_device_os(&self) -> &str {
        &self.device.os
    }

    /// Device OS version.
    pub fn user_agent_device_os_version(&self) -> &str {
        &self.device.os_version
    }

    /// Logs in persistence order.
    pub fn logs(&self) -> &[TransactionLog] {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_constructors() {
        let plain = LogEvent::new(4);
        assert_eq!(plain.usecase_event, 4);
        assert!(plain.err_code.is_none());

        let err = LogEvent::error(5, -1009, "offline");
        assert_eq!(err.err_code, Some(-1009));
        assert_eq!(err.err_description.as_deref(), Some("offline"));
    }

    #[test]
    fn timestamp_now_is_positive() {
        assert!(Timestamp::now().as_millis() > 0);
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
    }

    #[test]
    fn log_error_flag() {
        let log = TransactionLog {
            id: LogId::new(1),
            parent_transaction_id: LocalId::new(1),
            timestamp: Timestamp::from_millis(10),
            usecase_event: 2,
            in_context_err_code: None,
            in_context_err_description: Some("x".into()),
        };
        assert!(log.is_error());
        assert_eq!(log.in_context_err_description(), Some("x"));
    }
}
