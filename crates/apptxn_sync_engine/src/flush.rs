//! The flush coordinator.
//!
//! A flush pass reads every locally stored transaction, sends each one to
//! the remote store in fetch order and deletes exactly those the remote
//! acknowledged:
//!
//! - **Acknowledged**: the sent logs are deleted locally, and the
//!   transaction with them unless newer logs arrived during the pass
//! - **Server busy**: the busy callback fires once and the pass stops;
//!   this and every later candidate stay untouched
//! - **Other failure**: the transaction stays, its backoff grows, and the
//!   pass moves on to the next candidate
//!
//! Passes never overlap. Synchronous flushes wait for a running pass to
//! finish; asynchronous flushes are skipped while any pass is running.

use crate::config::FlushConfig;
use crate::error::{SyncError, SyncResult};
use crate::ledger::FailureLedger;
use crate::remote::RemoteStore;
use apptxn_core::{LocalId, SentDeletion, Transaction, TransactionRepository};
use apptxn_sync_protocol::{FlushRequest, RemoteOutcome};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Callback invoked when the remote reports it is busy during an
/// asynchronous flush.
pub type BusyHandler = Arc<dyn Fn() + Send + Sync>;

/// What one flush pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Number of transactions fetched as candidates.
    pub candidates: usize,
    /// Guids acknowledged by the remote and deleted locally.
    pub flushed: Vec<String>,
    /// Acknowledged guids kept stored because logs were added after the
    /// pass read them. A subset of `flushed`.
    pub requeued: Vec<String>,
    /// Guids the remote rejected or that could not be sent.
    pub failed: Vec<String>,
    /// Guids skipped because their backoff had not elapsed.
    pub deferred: Vec<String>,
    /// True if the pass stopped on a server-busy response.
    pub busy: bool,
}

impl FlushReport {
    /// Number of candidates left untouched because the pass stopped early.
    pub fn untouched(&self) -> usize {
        self.candidates - self.flushed.len() - self.failed.len() - self.deferred.len()
    }
}

/// Statistics about flush passes.
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    /// Passes that ran to completion or stopped on busy.
    pub passes: u64,
    /// Transactions acknowledged and deleted.
    pub transactions_flushed: u64,
    /// Server-busy responses received.
    pub busy_responses: u64,
    /// Failed sends.
    pub failures: u64,
    /// Asynchronous triggers skipped because a pass was running.
    pub skipped_ticks: u64,
    /// End of the last pass.
    pub last_pass: Option<Instant>,
    /// Duration of the last pass.
    pub last_duration: Duration,
    /// Error that aborted the last pass, if any.
    pub last_error: Option<String>,
}

/// Result of an asynchronous flush trigger.
#[derive(Debug)]
pub enum TickOutcome {
    /// A pass was started on a worker thread.
    Started(JoinHandle<SyncResult<FlushReport>>),
    /// A pass was already running; nothing was started.
    Skipped,
}

impl TickOutcome {
    /// Returns true if a pass was started.
    pub fn is_started(&self) -> bool {
        matches!(self, TickOutcome::Started(_))
    }
}

/// Marks a pass as running; releases it and wakes waiters when dropped.
struct PassGuard<'a> {
    running: &'a Mutex<bool>,
    idle: &'a Condvar,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.running.lock() = false;
        self.idle.notify_all();
    }
}

/// Sends locally stored transactions to the remote store.
pub struct FlushCoordinator<R: RemoteStore> {
    repository: Arc<TransactionRepository>,
    remote: R,
    config: FlushConfig,
    auth_token: RwLock<Option<String>>,
    busy_handler: RwLock<Option<BusyHandler>>,
    running: Mutex<bool>,
    idle: Condvar,
    ledger: FailureLedger,
    stats: RwLock<FlushStats>,
}

impl<R: RemoteStore> FlushCoordinator<R> {
    /// Creates a coordinator flushing `repository` to `remote`.
    pub fn new(repository: Arc<TransactionRepository>, remote: R, config: FlushConfig) -> Self {
        let ledger = FailureLedger::new(config.retry.clone());
        Self {
            repository,
            remote,
            config,
            auth_token: RwLock::new(None),
            busy_handler: RwLock::new(None),
            running: Mutex::new(false),
            idle: Condvar::new(),
            ledger,
            stats: RwLock::new(FlushStats::default()),
        }
    }

    /// Sets the auth token.
    #[must_use]
    pub fn with_auth_token(self, token: impl Into<String>) -> Self {
        *self.auth_token.write() = Some(token.into());
        self
    }

    /// Sets the busy handler used by asynchronous flushes.
    #[must_use]
    pub fn with_busy_handler(self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.set_busy_handler(Some(Arc::new(handler)));
        self
    }

    /// Replaces the auth token. `None` disables flushing.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write() = token;
    }

    /// Returns the current auth token.
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.read().clone()
    }

    /// Replaces the busy handler used by asynchronous flushes.
    pub fn set_busy_handler(&self, handler: Option<BusyHandler>) {
        *self.busy_handler.write() = handler;
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FlushConfig {
        &self.config
    }

    /// Returns the repository being flushed.
    pub fn repository(&self) -> &Arc<TransactionRepository> {
        &self.repository
    }

    /// Returns the remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> FlushStats {
        self.stats.read().clone()
    }

    /// Returns true while a pass is running or an asynchronous pass is
    /// about to start.
    pub fn is_flushing(&self) -> bool {
        *self.running.lock()
    }

    /// Consecutive failures recorded for a transaction.
    pub fn failure_count(&self, local_id: LocalId) -> u32 {
        self.ledger.failures(local_id)
    }

    /// Runs a flush pass on the calling thread.
    ///
    /// Blocks for the whole pass, including network I/O, and waits first if
    /// another pass is running. `on_server_busy` is called at most once.
    pub fn synchronous_flush<F>(&self, on_server_busy: F) -> SyncResult<FlushReport>
    where
        F: FnOnce(),
    {
        let _pass = self.wait_and_claim();
        self.run_pass(on_server_busy)
    }

    fn wait_and_claim(&self) -> PassGuard<'_> {
        let mut running = self.running.lock();
        while *running {
            self.idle.wait(&mut running);
        }
        *running = true;
        self.guard()
    }

    fn try_claim(&self) -> bool {
        let mut running = self.running.lock();
        !std::mem::replace(&mut *running, true)
    }

    /// Guard for a pass already claimed.
    fn guard(&self) -> PassGuard<'_> {
        PassGuard {
            running: &self.running,
            idle: &self.idle,
        }
    }

    fn run_pass<F: FnOnce()>(&self, on_server_busy: F) -> SyncResult<FlushReport> {
        let started = Instant::now();
        let result = self.flush_candidates(on_server_busy);

        let mut stats = self.stats.write();
        stats.last_pass = Some(Instant::now());
        stats.last_duration = started.elapsed();
        match &result {
            Ok(report) => {
                stats.passes += 1;
                stats.transactions_flushed += report.flushed.len() as u64;
                stats.failures += report.failed.len() as u64;
                if report.busy {
                    stats.busy_responses += 1;
                }
                stats.last_error = None;
                info!(
                    candidates = report.candidates,
                    flushed = report.flushed.len(),
                    failed = report.failed.len(),
                    deferred = report.deferred.len(),
                    busy = report.busy,
                    "flush pass finished"
                );
            }
            Err(e) => {
                stats.last_error = Some(e.to_string());
                error!(error = %e, "flush pass aborted");
            }
        }
        result
    }

    fn flush_candidates<F: FnOnce()>(&self, on_server_busy: F) -> SyncResult<FlushReport> {
        let token = self.auth_token().ok_or(SyncError::NotAuthenticated)?;
        let meta = self.config.remote.request_meta(&token);
        meta.charset.ensure_supported()?;

        let candidates = self.repository.all_transactions()?;
        let live: HashSet<LocalId> = candidates.iter().map(Transaction::local_id).collect();
        self.ledger.retain(&live);

        let mut report = FlushReport {
            candidates: candidates.len(),
            ..FlushReport::default()
        };
        let mut on_server_busy = Some(on_server_busy);

        for txn in &candidates {
            let guid = txn.guid().to_string();
            if self.ledger.is_deferred(txn.local_id(), Instant::now()) {
                debug!(%guid, "transaction deferred by backoff");
                report.deferred.push(guid);
                continue;
            }

            let request = FlushRequest::new(txn, meta.clone());
            let outcome = match self.remote.send(&request) {
                Ok(response) => response.outcome(),
                Err(e) => RemoteOutcome::Failed(e.to_string()),
            };

            match outcome {
                RemoteOutcome::Acknowledged => {
                    if self.repository.delete_sent(txn)? == SentDeletion::LogsRemain {
                        debug!(%guid, "logs added during the pass kept for the next pass");
                        report.requeued.push(guid.clone());
                    }
                    self.ledger.clear(txn.local_id());
                    debug!(%guid, local_id = %txn.local_id(), "transaction flushed");
                    report.flushed.push(guid);
                }
                RemoteOutcome::ServerBusy => {
                    warn!(%guid, "remote store busy; stopping flush pass");
                    report.busy = true;
                    if let Some(callback) = on_server_busy.take() {
                        callback();
                    }
                    break;
                }
                RemoteOutcome::Failed(reason) => {
                    let attempts =
                        self.ledger
                            .record_failure(txn.local_id(), &guid, Instant::now());
                    warn!(%guid, attempts, %reason, "transaction flush failed");
                    report.failed.push(guid);
                }
            }
        }

        Ok(report)
    }
}

impl<R: RemoteStore + 'static> FlushCoordinator<R> {
    /// Starts a flush pass on a worker thread unless a pass, synchronous or
    /// asynchronous, is already running.
    ///
    /// Server-busy responses go to the handler set with
    /// [`FlushCoordinator::set_busy_handler`].
    pub fn asynchronous_flush(self: &Arc<Self>) -> SyncResult<TickOutcome> {
        if !self.try_claim() {
            self.stats.write().skipped_ticks += 1;
            debug!("flush already in progress; tick skipped");
            return Ok(TickOutcome::Skipped);
        }

        let this = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("apptxn-flush".into())
            .spawn(move || {
                let _pass = this.guard();
                let handler = this.busy_handler.read().clone();
                this.run_pass(move || {
                    if let Some(handler) = handler {
                        handler();
                    }
                })
            });

        match spawned {
            Ok(handle) => Ok(TickOutcome::Started(handle)),
            Err(e) => {
                drop(self.guard());
                Err(SyncError::Scheduler(format!("failed to spawn flush thread: {e}")))
            }
        }
    }
}

impl<R: RemoteStore> std::fmt::Debug for FlushCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushCoordinator")
            .field("resource_uri", &self.config.remote.resource_uri)
            .field("flushing", &self.is_flushing())
            .finish_non_exhaustive()
    }
}
