//! Recurring asynchronous flush.

use crate::error::{SyncError, SyncResult};
use crate::flush::{FlushCoordinator, TickOutcome};
use crate::remote::RemoteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// A tokio task that triggers [`FlushCoordinator::asynchronous_flush`]
/// every interval.
///
/// Ticks missed while the runtime was busy are skipped, not replayed, and
/// ticks that fire while a pass is running are skipped by the coordinator.
/// Dropping the scheduler also stops the task.
#[derive(Debug)]
pub struct FlushScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    interval: Duration,
}

impl FlushScheduler {
    /// Starts the scheduler on the current tokio runtime.
    ///
    /// The first tick fires one `interval` after the start.
    pub fn start<R>(coordinator: Arc<FlushCoordinator<R>>, interval: Duration) -> SyncResult<Self>
    where
        R: RemoteStore + 'static,
    {
        if interval.is_zero() {
            return Err(SyncError::Scheduler("flush interval must be non-zero".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Scheduler(e.to_string()))?;

        let (shutdown, mut stop) = watch::channel(false);
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => match coordinator.asynchronous_flush() {
                        Ok(TickOutcome::Started(_)) => trace!("scheduled flush started"),
                        Ok(TickOutcome::Skipped) => debug!("scheduled flush skipped"),
                        Err(e) => warn!(error = %e, "scheduled flush could not start"),
                    },
                    _ = stop.changed() => break,
                }
            }
            debug!("flush scheduler stopped");
        });

        debug!(interval_ms = interval.as_millis() as u64, "flush scheduler started");
        Ok(Self {
            shutdown,
            task,
            interval,
        })
    }

    /// Returns the tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops the scheduler and waits for its task to finish.
    ///
    /// A pass already running on a worker thread is not interrupted.
    pub async fn shutdown(self) {
        // The receiver is gone only if the task already ended.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "flush scheduler task failed");
        }
    }
}
