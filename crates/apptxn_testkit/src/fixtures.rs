//! Test fixtures and repository helpers.
//!
//! Provides convenience functions for setting up test repositories
//! and common flush configurations.

use apptxn_core::{DeviceInfo, LogEvent, Transaction, TransactionRepository};
use apptxn_storage::StoreConfig;
use apptxn_sync_engine::{FlushConfig, RemoteConfig, RetryConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test repository with automatic cleanup.
pub struct TestStore {
    /// The repository instance.
    pub repository: Arc<TransactionRepository>,
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test repository.
    pub fn memory() -> Self {
        Self {
            repository: Arc::new(
                TransactionRepository::open_in_memory().expect("Failed to open in-memory store"),
            ),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test repository.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("apptxn.db");
        let repository = TransactionRepository::open(&path, &StoreConfig::default())
            .expect("Failed to open file store");

        Self {
            repository: Arc::new(repository),
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Opens a second repository over the same file, as a restarted
    /// process would.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    pub fn reopen(&self) -> TransactionRepository {
        let path = self.path().expect("Only file stores can be reopened");
        TransactionRepository::open(path, &StoreConfig::default()).expect("Failed to reopen store")
    }

    /// Guids of every stored transaction, in fetch order.
    pub fn stored_guids(&self) -> Vec<String> {
        self.repository
            .all_transactions()
            .expect("Failed to fetch transactions")
            .iter()
            .map(|t| t.guid().to_string())
            .collect()
    }
}

impl std::ops::Deref for TestStore {
    type Target = TransactionRepository;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

/// Runs a test with a temporary in-memory repository.
///
/// # Example
///
/// ```rust
/// use apptxn_testkit::{test_device, with_temp_repository};
///
/// with_temp_repository(|repo| {
///     repo.create_transaction(1, &test_device()).unwrap();
///     assert_eq!(repo.all_transactions().unwrap().len(), 1);
/// });
/// ```
pub fn with_temp_repository<F, R>(f: F) -> R
where
    F: FnOnce(&TransactionRepository) -> R,
{
    let store = TestStore::memory();
    f(&store.repository)
}

/// Runs a test with a temporary file-based repository.
pub fn with_file_repository<F, R>(f: F) -> R
where
    F: FnOnce(&TransactionRepository, &Path) -> R,
{
    let store = TestStore::file();
    let path = store.path().expect("File store should have a path");
    f(&store.repository, path)
}

/// Device metadata used throughout the tests.
pub fn test_device() -> DeviceInfo {
    DeviceInfo::new("iPhone7,2", "iPhone OS", "8.1.2")
}

/// Remote configuration pointing nowhere in particular.
pub fn test_remote_config() -> RemoteConfig {
    RemoteConfig::new("https://api.example.test/apptxns", "fp-auth", "fp-token")
}

/// Flush configuration that retries failures on every pass.
pub fn test_flush_config() -> FlushConfig {
    FlushConfig::new(test_remote_config()).with_retry(RetryConfig::no_backoff())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates `count` transactions with guids `txn-0`, `txn-1`, ... and
    /// `logs_per_txn` events each.
    pub fn populate(repo: &TransactionRepository, count: usize, logs_per_txn: usize) -> Vec<Transaction> {
        let device = test_device();
        (0..count)
            .map(|i| {
                let txn = repo
                    .create_transaction_with_guid(format!("txn-{i}"), i as i64, &device)
                    .expect("Failed to create transaction");
                for event in 0..logs_per_txn {
                    repo.log_event(&txn, LogEvent::new(event as i64))
                        .expect("Failed to log event");
                }
                txn
            })
            .collect()
    }

    /// Creates a store with `count` populated transactions.
    pub fn populated_store(count: usize, logs_per_txn: usize) -> TestStore {
        let store = TestStore::memory();
        populate(&store, count, logs_per_txn);
        store
    }
}
