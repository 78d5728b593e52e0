//! Concurrency stress helpers.
//!
//! These exercise the repository the way an application does: many threads
//! logging events at once while flushes run.

use apptxn_core::{LogEvent, Transaction, TransactionRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Total operations attempted.
    pub fn total_ops(&self) -> usize {
        self.successful_ops + self.failed_ops
    }

    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Events logged by each thread.
    pub events_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            events_per_thread: 250,
        }
    }
}

/// Logs events against `txn` from several threads at once.
///
/// Thread `t` logs use-case events `t * events_per_thread ..`, so every
/// stored event is distinct.
pub fn stress_concurrent_logging(
    repo: &Arc<TransactionRepository>,
    txn: &Transaction,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let repo = Arc::clone(repo);
            let txn = txn.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let per_thread = config.events_per_thread;
            thread::spawn(move || {
                for i in 0..per_thread {
                    let event = (t * per_thread + i) as i64;
                    match repo.log_event(&txn, LogEvent::new(event)) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Logging thread panicked");
    }

    StressTestResult {
        successful_ops: successful.load(Ordering::Relaxed),
        failed_ops: failed.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}
