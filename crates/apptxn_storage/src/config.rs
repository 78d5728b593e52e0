//! Store configuration.

use std::time::Duration;

/// SQLite journal mode applied to file-backed stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Rollback journal deleted at the end of each transaction.
    Delete,
    /// Write-ahead log.
    Wal,
}

impl JournalMode {
    /// Returns the pragma value.
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
        }
    }
}

/// SQLite `synchronous` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousMode {
    /// No syncs (fast, not crash-safe).
    Off,
    /// Sync at critical moments.
    Normal,
    /// Sync on every commit.
    Full,
}

impl SynchronousMode {
    /// Returns the pragma value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SynchronousMode::Off => "OFF",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Full => "FULL",
        }
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the data file (and parent directories) if missing.
    pub create_if_missing: bool,

    /// Journal mode for file-backed stores.
    pub journal_mode: JournalMode,

    /// Durability level.
    pub synchronous: SynchronousMode,

    /// How long the engine waits on a locked data file before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            journal_mode: JournalMode::Wal,
            synchronous: SynchronousMode::Full,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the journal mode.
    #[must_use]
    pub const fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Sets the durability level.
    #[must_use]
    pub const fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}
