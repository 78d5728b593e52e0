//! Integration tests for the flush engine against real SQLite stores.

use apptxn_core::{DeviceInfo, LogEvent, TransactionRepository};
use apptxn_sync_engine::{
    FlushCoordinator, FlushScheduler, ManagerConfig, MockReply, RemoteResponse, RemoteStore,
    RetryConfig, SyncError, SyncResult, TickOutcome, TransactionManager,
};
use apptxn_sync_protocol::FlushRequest;
use apptxn_testkit::{
    scenarios, status_strategy, stress_concurrent_logging, test_device, test_flush_config,
    transaction_spec_strategy, ScriptedRemote, StressConfig, TestStore,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn coordinator(store: &TestStore, remote: &Arc<ScriptedRemote>) -> Arc<FlushCoordinator<Arc<ScriptedRemote>>> {
    Arc::new(
        FlushCoordinator::new(Arc::clone(&store.repository), Arc::clone(remote), test_flush_config())
            .with_auth_token("token-1"),
    )
}

#[test]
fn create_assigns_fresh_positive_ids() {
    let store = TestStore::file();
    let device = DeviceInfo::new("Pixel 8", "Android", "14");

    let first = store.create_transaction(5, &device).unwrap();
    let second = store.create_transaction(5, &device).unwrap();

    assert!(first.local_id().as_i64() > 0);
    assert!(second.local_id() > first.local_id());
    assert_eq!(first.usecase(), 5);
    assert_eq!(first.device(), &device);
}

#[test]
fn fetched_transactions_match_created() {
    let store = TestStore::file();
    let created = scenarios::populate(&store, 4, 0);

    let fetched = store.reopen().all_transactions().unwrap();
    assert_eq!(fetched.len(), created.len());
    for (f, c) in fetched.iter().zip(&created) {
        assert_eq!(f.guid(), c.guid());
        assert_eq!(f.usecase(), c.usecase());
        assert_eq!(f.device(), c.device());
    }
}

#[test]
fn logged_timestamps_never_decrease() {
    let store = TestStore::memory();
    let txn = store.create_transaction(1, &test_device()).unwrap();
    let first = store.log_event(&txn, LogEvent::new(1)).unwrap();
    let second = store.log_event(&txn, LogEvent::error(2, 404, "not found")).unwrap();

    assert!(first.timestamp() <= second.timestamp());
    let logs = store.transaction(txn.local_id()).unwrap().unwrap().logs().to_vec();
    assert_eq!(logs, vec![first, second]);
}

#[test]
fn delete_all_removes_transactions_and_logs() {
    let store = TestStore::file();
    scenarios::populate(&store, 3, 2);

    assert_eq!(store.delete_all().unwrap(), 3);
    assert!(store.all_transactions().unwrap().is_empty());
    assert_eq!(store.counts().unwrap().logs, 0);
}

#[test]
fn acknowledged_transaction_is_purged_and_not_resent() {
    let store = TestStore::file();
    scenarios::populate(&store, 1, 2);
    let remote = Arc::new(ScriptedRemote::new());
    let coordinator = coordinator(&store, &remote);

    let report = coordinator.synchronous_flush(|| panic!("remote is not busy")).unwrap();
    assert_eq!(report.flushed, vec!["txn-0"]);
    assert!(store.all_transactions().unwrap().is_empty());
    assert_eq!(store.counts().unwrap().logs, 0);

    let second = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(second.candidates, 0);
    assert_eq!(remote.times_sent("txn-0"), 1);
}

#[test]
fn busy_on_first_candidate_keeps_everything() {
    let store = TestStore::file();
    let created = scenarios::populate(&store, 3, 1);
    let remote = Arc::new(ScriptedRemote::always(503));
    let coordinator = coordinator(&store, &remote);

    let busy_calls = AtomicUsize::new(0);
    let report = coordinator
        .synchronous_flush(|| {
            busy_calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(report.busy);
    assert_eq!(busy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote.sent_guids(), vec!["txn-0"]);
    assert_eq!(store.all_transactions().unwrap(), {
        let mut expected = Vec::new();
        for txn in &created {
            expected.push(store.transaction(txn.local_id()).unwrap().unwrap());
        }
        expected
    });
    assert_eq!(report.untouched(), 3);
}

#[test]
fn busy_midway_stops_after_acknowledged_prefix() {
    let store = TestStore::memory();
    scenarios::populate(&store, 4, 0);
    let remote = Arc::new(ScriptedRemote::new());
    remote.script_guid("txn-2", [MockReply::Status(503)]);
    let coordinator = coordinator(&store, &remote);

    let report = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(report.flushed, vec!["txn-0", "txn-1"]);
    assert_eq!(store.stored_guids(), vec!["txn-2", "txn-3"]);
    assert_eq!(remote.times_sent("txn-3"), 0);

    let retry = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(retry.flushed, vec!["txn-2", "txn-3"]);
    assert!(store.stored_guids().is_empty());
}

#[test]
fn other_failures_never_delete() {
    let store = TestStore::memory();
    scenarios::populate(&store, 3, 1);
    let remote = Arc::new(ScriptedRemote::new());
    remote.script_guid("txn-0", [MockReply::Status(422)]);
    remote.script_guid("txn-1", [MockReply::NetworkError("connection reset".into())]);
    let coordinator = coordinator(&store, &remote);

    let report = coordinator.synchronous_flush(|| panic!("remote is not busy")).unwrap();
    assert_eq!(report.failed, vec!["txn-0", "txn-1"]);
    assert_eq!(report.flushed, vec!["txn-2"]);
    assert_eq!(store.stored_guids(), vec!["txn-0", "txn-1"]);
    assert_eq!(coordinator.stats().failures, 2);
}

#[test]
fn backoff_skips_recently_failed_transactions() {
    let store = TestStore::memory();
    scenarios::populate(&store, 2, 0);
    let remote = Arc::new(ScriptedRemote::new());
    remote.script_guid("txn-0", [MockReply::Status(500)]);
    let config = test_flush_config()
        .with_retry(RetryConfig::new(3).with_initial_delay(Duration::from_secs(3600)));
    let coordinator = FlushCoordinator::new(Arc::clone(&store.repository), Arc::clone(&remote), config)
        .with_auth_token("token-1");

    assert_eq!(coordinator.synchronous_flush(|| {}).unwrap().failed, vec!["txn-0"]);
    let second = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(second.deferred, vec!["txn-0"]);
    assert_eq!(remote.times_sent("txn-0"), 1);
    assert_eq!(store.stored_guids(), vec!["txn-0"]);
}

#[test]
fn overlapping_async_triggers_send_one_batch() {
    let store = TestStore::file();
    scenarios::populate(&store, 3, 1);
    let remote = Arc::new(ScriptedRemote::new().with_latency(Duration::from_millis(100)));
    let coordinator = coordinator(&store, &remote);

    let first = coordinator.asynchronous_flush().unwrap();
    let second = coordinator.asynchronous_flush().unwrap();
    assert!(coordinator.is_flushing());
    assert!(matches!(second, TickOutcome::Skipped));

    let TickOutcome::Started(handle) = first else {
        panic!("first trigger should start a pass");
    };
    let report = handle.join().unwrap().unwrap();

    assert_eq!(report.flushed.len(), 3);
    assert_eq!(remote.requests().len(), 3);
    for guid in ["txn-0", "txn-1", "txn-2"] {
        assert_eq!(remote.times_sent(guid), 1);
    }
    assert_eq!(remote.max_in_flight(), 1);
    assert_eq!(coordinator.stats().skipped_ticks, 1);
    assert!(!coordinator.is_flushing());
}

#[test]
fn synchronous_flush_waits_for_running_pass() {
    let store = TestStore::memory();
    scenarios::populate(&store, 2, 0);
    let remote = Arc::new(ScriptedRemote::new().with_latency(Duration::from_millis(50)));
    let coordinator = coordinator(&store, &remote);

    let TickOutcome::Started(handle) = coordinator.asynchronous_flush().unwrap() else {
        panic!("expected a started pass");
    };
    coordinator.synchronous_flush(|| {}).unwrap();
    handle.join().unwrap().unwrap();

    assert!(store.stored_guids().is_empty());
    assert_eq!(remote.times_sent("txn-0"), 1);
    assert_eq!(remote.times_sent("txn-1"), 1);
    assert_eq!(remote.max_in_flight(), 1);
}

#[test]
fn failed_async_pass_releases_the_guard() {
    let store = TestStore::memory();
    scenarios::populate(&store, 1, 0);
    let remote = Arc::new(ScriptedRemote::new());
    let coordinator = coordinator(&store, &remote);
    coordinator.set_auth_token(None);

    let TickOutcome::Started(handle) = coordinator.asynchronous_flush().unwrap() else {
        panic!("expected a started pass");
    };
    assert!(matches!(handle.join().unwrap(), Err(SyncError::NotAuthenticated)));
    assert!(remote.requests().is_empty());

    coordinator.set_auth_token(Some("token-2".into()));
    let TickOutcome::Started(handle) = coordinator.asynchronous_flush().unwrap() else {
        panic!("guard should have been released");
    };
    assert_eq!(handle.join().unwrap().unwrap().flushed, vec!["txn-0"]);
    assert_eq!(
        remote.requests()[0].meta.authorization_header(),
        "fp-auth fp-token=\"token-2\""
    );
}

#[test]
fn tick_during_synchronous_pass_is_skipped() {
    let store = TestStore::memory();
    scenarios::populate(&store, 2, 1);
    let remote = Arc::new(ScriptedRemote::new().with_latency(Duration::from_millis(200)));
    let coordinator = coordinator(&store, &remote);

    let sync_pass = {
        let coordinator = Arc::clone(&coordinator);
        std::thread::spawn(move || coordinator.synchronous_flush(|| {}))
    };
    while !coordinator.is_flushing() {
        std::thread::sleep(Duration::from_millis(5));
    }
    let tick = coordinator.asynchronous_flush().unwrap();
    assert!(matches!(tick, TickOutcome::Skipped));

    let report = sync_pass.join().unwrap().unwrap();
    assert_eq!(report.flushed, vec!["txn-0", "txn-1"]);
    let stats = coordinator.stats();
    assert_eq!(stats.passes, 1);
    assert_eq!(stats.skipped_ticks, 1);
    assert_eq!(remote.requests().len(), 2);
}

/// Acknowledges everything, logging one more event against the first
/// transaction it sees while that transaction is being sent.
struct AppendingRemote {
    repository: Arc<TransactionRepository>,
    appended: AtomicBool,
    sent_log_counts: Mutex<Vec<usize>>,
}

impl RemoteStore for AppendingRemote {
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse> {
        self.sent_log_counts.lock().push(request.payload.logs.len());
        if !self.appended.swap(true, Ordering::SeqCst) {
            if let Some(txn) = self.repository.find_by_guid(&request.payload.guid)? {
                self.repository.log_event(&txn, LogEvent::new(99))?;
            }
        }
        Ok(RemoteResponse::ok())
    }
}

#[test]
fn logs_written_during_a_pass_are_sent_later() {
    let store = TestStore::file();
    scenarios::populate(&store, 1, 1);
    let remote = Arc::new(AppendingRemote {
        repository: Arc::clone(&store.repository),
        appended: AtomicBool::new(false),
        sent_log_counts: Mutex::new(Vec::new()),
    });
    let coordinator = FlushCoordinator::new(Arc::clone(&store.repository), Arc::clone(&remote), test_flush_config())
        .with_auth_token("token-1");

    let first = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(first.flushed, vec!["txn-0"]);
    assert_eq!(first.requeued, vec!["txn-0"]);
    let kept = store.find_by_guid("txn-0").unwrap().unwrap();
    assert_eq!(kept.logs().len(), 1);
    assert_eq!(kept.logs()[0].usecase_event(), 99);

    let second = coordinator.synchronous_flush(|| {}).unwrap();
    assert_eq!(second.flushed, vec!["txn-0"]);
    assert!(second.requeued.is_empty());
    assert!(store.stored_guids().is_empty());
    assert_eq!(*remote.sent_log_counts.lock(), vec![1, 1]);
}

#[test]
fn every_persisted_log_is_sent_while_flushing_concurrently() {
    let store = TestStore::file();
    let txn = store.create_transaction(1, &test_device()).unwrap();
    store.log_event(&txn, LogEvent::new(0)).unwrap();
    let remote = Arc::new(ScriptedRemote::new());
    let coordinator = coordinator(&store, &remote);

    let logging = {
        let repository = Arc::clone(&store.repository);
        let config = StressConfig {
            threads: 3,
            events_per_thread: 40,
        };
        std::thread::spawn(move || stress_concurrent_logging(&repository, &txn, &config))
    };
    while !logging.is_finished() {
        coordinator.synchronous_flush(|| {}).unwrap();
    }
    let result = logging.join().unwrap();
    coordinator.synchronous_flush(|| {}).unwrap();

    // logging fails once a flush has removed the transaction entirely
    let sent: usize = remote.requests().iter().map(|r| r.payload.logs.len()).sum();
    assert_eq!(sent, result.successful_ops + 1);
    assert_eq!(result.total_ops(), 120);
    assert!(result.ops_per_second() > 0.0);
    assert!(store.stored_guids().is_empty());
}

#[test]
fn async_busy_goes_to_handler() {
    let store = TestStore::memory();
    scenarios::populate(&store, 2, 0);
    let remote = Arc::new(ScriptedRemote::always(503));
    let coordinator = coordinator(&store, &remote);

    let busy_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&busy_calls);
    coordinator.set_busy_handler(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    let TickOutcome::Started(handle) = coordinator.asynchronous_flush().unwrap() else {
        panic!("expected a started pass");
    };
    assert!(handle.join().unwrap().unwrap().busy);
    assert_eq!(busy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.stored_guids(), vec!["txn-0", "txn-1"]);
}

#[test]
fn unflushed_transactions_survive_restart() {
    let store = TestStore::file();
    scenarios::populate(&store, 2, 3);
    let remote = Arc::new(ScriptedRemote::always(500));
    coordinator(&store, &remote).synchronous_flush(|| {}).unwrap();

    let reopened = store.reopen();
    let all = reopened.all_transactions().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|t| t.logs().len() == 3));
}

#[test]
fn manager_round_trip() {
    let store = TestStore::file();
    let config = ManagerConfig::new(test_device(), test_flush_config());
    let remote = Arc::new(ScriptedRemote::new());
    let manager = TransactionManager::open(store.path().unwrap(), config, Arc::clone(&remote)).unwrap();
    manager.set_auth_token(Some("token-1".into()));

    let txn = manager.transaction(9).unwrap();
    manager.log_event(&txn, LogEvent::new(1)).unwrap();
    manager.log_event(&txn, LogEvent::error(2, 7, "card declined")).unwrap();

    manager.synchronous_flush(|| {}).unwrap();
    let sent = remote.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload.usecase, 9);
    assert_eq!(sent[0].payload.logs.len(), 2);
    assert_eq!(sent[0].payload.logs[1].in_context_err_desc.as_deref(), Some("card declined"));
    assert!(manager.all_transactions().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_drains_the_store() {
    let store = TestStore::memory();
    scenarios::populate(&store, 5, 1);
    let remote = Arc::new(ScriptedRemote::new());
    let coordinator = coordinator(&store, &remote);

    let scheduler = FlushScheduler::start(Arc::clone(&coordinator), Duration::from_millis(20)).unwrap();
    for _ in 0..100 {
        if store.stored_guids().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    scheduler.shutdown().await;

    assert!(store.stored_guids().is_empty());
    assert_eq!(remote.requests().len(), 5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn flush_deletes_exactly_the_acknowledged(
        specs in prop::collection::vec(transaction_spec_strategy(3), 1..6),
        statuses in prop::collection::vec(status_strategy(), 6),
    ) {
        let store = TestStore::memory();
        let mut guids = Vec::new();
        for (usecase, device, events) in &specs {
            let txn = store.create_transaction(*usecase, device).unwrap();
            for event in events {
                store.log_event(&txn, event.clone()).unwrap();
            }
            guids.push(txn.guid().to_string());
        }
        let remote = Arc::new(
            ScriptedRemote::new().then(statuses.iter().map(|status| MockReply::Status(*status))),
        );
        let coordinator = coordinator(&store, &remote);

        let busy_calls = AtomicUsize::new(0);
        let report = coordinator
            .synchronous_flush(|| {
                busy_calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let mut kept = Vec::new();
        let mut sent = 0;
        let mut stopped = false;
        for (guid, status) in guids.iter().zip(&statuses) {
            if stopped {
                kept.push(guid.clone());
                continue;
            }
            sent += 1;
            match *status {
                200..=299 => {}
                503 => {
                    stopped = true;
                    kept.push(guid.clone());
                }
                _ => kept.push(guid.clone()),
            }
        }

        prop_assert_eq!(store.stored_guids(), kept);
        prop_assert_eq!(remote.requests().len(), sent);
        prop_assert_eq!(report.busy, stopped);
        prop_assert_eq!(busy_calls.load(Ordering::SeqCst), usize::from(stopped));
    }
}
