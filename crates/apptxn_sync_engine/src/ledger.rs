//! Per-transaction failure tracking.
//!
//! A transaction the remote keeps rejecting is not retried on every pass;
//! it waits out an exponential delay first. The ledger is in-memory only,
//! so a restart makes every transaction eligible again.

use crate::config::RetryConfig;
use apptxn_core::LocalId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    failures: u32,
    next_eligible: Instant,
}

#[derive(Debug)]
pub(crate) struct FailureLedger {
    retry: RetryConfig,
    entries: Mutex<HashMap<LocalId, FailureRecord>>,
}

impl FailureLedger {
    pub(crate) fn new(retry: RetryConfig) -> Self {
        Self {
            retry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// True while `id` is still waiting out its backoff.
    pub(crate) fn is_deferred(&self, id: LocalId, now: Instant) -> bool {
        self.entries
            .lock()
            .get(&id)
            .is_some_and(|record| now < record.next_eligible)
    }

    /// Records one more failure and returns the consecutive failure count.
    pub(crate) fn record_failure(&self, id: LocalId, guid: &str, now: Instant) -> u32 {
        let mut entries = self.entries.lock();
        let failures = entries.get(&id).map_or(0, |r| r.failures).saturating_add(1);
        let delay = self.retry.delay_for_attempt(failures);
        entries.insert(
            id,
            FailureRecord {
                failures,
                next_eligible: now + delay,
            },
        );

        if self.retry.is_exhausted(failures) && !self.retry.is_exhausted(failures - 1) {
            warn!(
                %guid,
                failures,
                delay_ms = delay.as_millis() as u64,
                "transaction keeps failing; retrying at the maximum interval"
            );
        }
        failures
    }

    pub(crate) fn clear(&self, id: LocalId) {
        self.entries.lock().remove(&id);
    }

    /// Drops entries for transactions that no longer exist locally.
    pub(crate) fn retain(&self, live: &HashSet<LocalId>) {
        self.entries.lock().retain(|id, _| live.contains(id));
    }

    pub(crate) fn failures(&self, id: LocalId) -> u32 {
        self.entries.lock().get(&id).map_or(0, |r| r.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ledger() -> FailureLedger {
        FailureLedger::new(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_secs(10))
                .with_max_delay(Duration::from_secs(60)),
        )
    }

    #[test]
    fn failures_defer_until_backoff_elapses() {
        let ledger = ledger();
        let id = LocalId::new(1);
        let now = Instant::now();

        assert!(!ledger.is_deferred(id, now));
        assert_eq!(ledger.record_failure(id, "g", now), 1);
        assert!(ledger.is_deferred(id, now + Duration::from_secs(9)));
        assert!(!ledger.is_deferred(id, now + Duration::from_secs(10)));

        assert_eq!(ledger.record_failure(id, "g", now), 2);
        assert!(ledger.is_deferred(id, now + Duration::from_secs(19)));
    }

    #[test]
    fn exhausted_transactions_wait_the_maximum_delay() {
        let ledger = ledger();
        let id = LocalId::new(1);
        let now = Instant::now();

        for _ in 0..3 {
            ledger.record_failure(id, "g", now);
        }
        assert_eq!(ledger.failures(id), 3);
        assert!(ledger.is_deferred(id, now + Duration::from_secs(59)));
        assert!(!ledger.is_deferred(id, now + Duration::from_secs(60)));
    }

    #[test]
    fn clear_and_retain() {
        let ledger = ledger();
        let now = Instant::now();
        let (a, b) = (LocalId::new(1), LocalId::new(2));
        ledger.record_failure(a, "a", now);
        ledger.record_failure(b, "b", now);

        ledger.clear(a);
        assert_eq!(ledger.failures(a), 0);
        assert!(!ledger.is_deferred(a, now));

        ledger.retain(&HashSet::new());
        assert_eq!(ledger.failures(b), 0);
    }
}
