//! Application-facing facade.

use crate::config::ManagerConfig;
use crate::error::SyncResult;
use crate::flush::{FlushCoordinator, FlushReport, FlushStats, TickOutcome};
use crate::remote::RemoteStore;
use crate::scheduler::FlushScheduler;
use apptxn_core::{DeviceInfo, LogEvent, Transaction, TransactionLog, TransactionRepository};
use std::path::Path;
use std::sync::Arc;

/// Records transactions for this device and flushes them to the remote.
///
/// Binds the device metadata, the repository and the flush coordinator
/// together. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct TransactionManager<R: RemoteStore> {
    device: DeviceInfo,
    repository: Arc<TransactionRepository>,
    coordinator: Arc<FlushCoordinator<R>>,
}

impl<R: RemoteStore> TransactionManager<R> {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>, config: ManagerConfig, remote: R) -> SyncResult<Self> {
        let repository = TransactionRepository::open(path, &config.store)?;
        Ok(Self::with_repository(Arc::new(repository), config, remote))
    }

    /// Opens a manager over a fresh in-memory store.
    pub fn open_in_memory(config: ManagerConfig, remote: R) -> SyncResult<Self> {
        let repository = TransactionRepository::open_in_memory()?;
        Ok(Self::with_repository(Arc::new(repository), config, remote))
    }

    /// Creates a manager over an existing repository.
    pub fn with_repository(
        repository: Arc<TransactionRepository>,
        config: ManagerConfig,
        remote: R,
    ) -> Self {
        let coordinator = FlushCoordinator::new(Arc::clone(&repository), remote, config.flush);
        Self {
            device: config.device,
            repository,
            coordinator: Arc::new(coordinator),
        }
    }

    /// Device metadata stamped on new transactions.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Arc<TransactionRepository> {
        &self.repository
    }

    /// The flush coordinator.
    pub fn coordinator(&self) -> &Arc<FlushCoordinator<R>> {
        &self.coordinator
    }

    /// Creates and persists a transaction for `usecase`.
    pub fn transaction(&self, usecase: i64) -> SyncResult<Transaction> {
        Ok(self.repository.create_transaction(usecase, &self.device)?)
    }

    /// Persists one event for `txn`.
    pub fn log_event(&self, txn: &Transaction, event: LogEvent) -> SyncResult<TransactionLog> {
        Ok(self.repository.log_event(txn, event)?)
    }

    /// Every stored transaction with its logs.
    pub fn all_transactions(&self) -> SyncResult<Vec<Transaction>> {
        Ok(self.repository.all_transactions()?)
    }

    /// Deletes every stored transaction, e.g. on logout.
    pub fn delete_all_transactions(&self) -> SyncResult<usize> {
        Ok(self.repository.delete_all()?)
    }

    /// Deletes the given transactions.
    pub fn delete_transactions(&self, txns: &[Transaction]) -> SyncResult<usize> {
        Ok(self.repository.delete_transactions(txns)?)
    }

    /// Replaces the auth token sent with flush requests.
    pub fn set_auth_token(&self, token: Option<String>) {
        self.coordinator.set_auth_token(token);
    }

    /// Flushes on the calling thread. See [`FlushCoordinator::synchronous_flush`].
    pub fn synchronous_flush<F: FnOnce()>(&self, on_server_busy: F) -> SyncResult<FlushReport> {
        self.coordinator.synchronous_flush(on_server_busy)
    }

    /// Flush statistics.
    pub fn flush_stats(&self) -> FlushStats {
        self.coordinator.stats()
    }
}

impl<R: RemoteStore + 'static> TransactionManager<R> {
    /// Triggers a background flush. See [`FlushCoordinator::asynchronous_flush`].
    pub fn asynchronous_flush(&self) -> SyncResult<TickOutcome> {
        self.coordinator.asynchronous_flush()
    }

    /// Starts flushing every configured interval on the current tokio runtime.
    pub fn start_scheduler(&self) -> SyncResult<FlushScheduler> {
        let interval = self.coordinator.config().flush_interval;
        FlushScheduler::start(Arc::clone(&self.coordinator), interval)
    }
}
