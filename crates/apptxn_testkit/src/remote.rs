//! A scriptable remote store for flush tests.

use apptxn_sync_engine::{MockReply, RemoteResponse, RemoteStore, SyncError, SyncResult};
use apptxn_sync_protocol::FlushRequest;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A remote whose replies can be scripted per request or per guid.
///
/// Reply selection, first match wins:
/// 1. the next reply scripted for the request's guid
/// 2. the next reply from the shared queue
/// 3. the default reply
///
/// Each send can be slowed down by a fixed latency. The remote also tracks
/// how many sends were in flight at once.
#[derive(Debug)]
pub struct ScriptedRemote {
    by_guid: Mutex<HashMap<String, VecDeque<MockReply>>>,
    queue: Mutex<VecDeque<MockReply>>,
    default_reply: Mutex<MockReply>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<FlushRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRemote {
    /// A remote that acknowledges everything immediately.
    pub fn new() -> Self {
        Self {
            by_guid: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(MockReply::Status(200)),
            latency: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A remote that answers every request with `status`.
    pub fn always(status: u16) -> Self {
        Self::new().with_default(MockReply::Status(status))
    }

    /// Sets the default reply.
    #[must_use]
    pub fn with_default(self, reply: MockReply) -> Self {
        *self.default_reply.lock() = reply;
        self
    }

    /// Delays every send by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Queues replies answered in order, regardless of guid.
    #[must_use]
    pub fn then(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.queue.lock().extend(replies);
        self
    }

    /// Scripts replies for one guid.
    pub fn script_guid(&self, guid: impl Into<String>, replies: impl IntoIterator<Item = MockReply>) {
        self.by_guid
            .lock()
            .entry(guid.into())
            .or_default()
            .extend(replies);
    }

    /// Replaces the default reply.
    pub fn set_default(&self, reply: MockReply) {
        *self.default_reply.lock() = reply;
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<FlushRequest> {
        self.requests.lock().clone()
    }

    /// Guids of the requests received so far, in order.
    pub fn sent_guids(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.guid().to_string())
            .collect()
    }

    /// Number of requests received for `guid`.
    pub fn times_sent(&self, guid: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.guid() == guid).count()
    }

    /// Highest number of sends observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, guid: &str) -> MockReply {
        if let Some(reply) = self.by_guid.lock().get_mut(guid).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(reply) = self.queue.lock().pop_front() {
            return reply;
        }
        self.default_reply.lock().clone()
    }
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for ScriptedRemote {
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        self.requests.lock().push(request.clone());
        let reply = self.next_reply(request.guid());
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            MockReply::Status(status) => Ok(RemoteResponse::new(status)),
            MockReply::NetworkError(message) => Err(SyncError::transport_retryable(message)),
        }
    }
}
