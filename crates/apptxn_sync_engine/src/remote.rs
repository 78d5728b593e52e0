//! Remote store abstraction.

use crate::error::{SyncError, SyncResult};
use apptxn_sync_protocol::{classify_status, FlushRequest, RemoteOutcome, SERVICE_UNAVAILABLE};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Status returned by the remote store for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteResponse {
    /// HTTP status code.
    pub status: u16,
}

impl RemoteResponse {
    /// Creates a response with the given status.
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// `200 OK`.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// `503 Service Unavailable`.
    pub fn busy() -> Self {
        Self::new(SERVICE_UNAVAILABLE)
    }

    /// Classifies the status.
    pub fn outcome(&self) -> RemoteOutcome {
        classify_status(self.status)
    }
}

/// The remote side of a flush: accepts one transaction per call.
///
/// Implementations must be safe to call from the background flush thread.
/// An `Err` means the exchange itself failed (network, encoding); any answer
/// from the remote, including busy and error statuses, is an `Ok`.
pub trait RemoteStore: Send + Sync {
    /// Sends one transaction and returns the remote's answer.
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse> {
        (**self).send(request)
    }
}

/// A scripted reply for [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with this status.
    Status(u16),
    /// Fail the exchange with a retryable transport error.
    NetworkError(String),
}

/// A mock remote for testing.
///
/// Replies are taken from a queue; once it is empty the default reply is
/// used. Every request is recorded.
#[derive(Debug)]
pub struct MockRemote {
    replies: Mutex<VecDeque<MockReply>>,
    default_reply: Mutex<MockReply>,
    sent: Mutex<Vec<FlushRequest>>,
}

impl MockRemote {
    /// Creates a mock remote that acknowledges everything.
    pub fn new() -> Self {
        Self::with_default(MockReply::Status(200))
    }

    /// Creates a mock remote with the given default reply.
    pub fn with_default(reply: MockReply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(reply),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queues a reply for the next unanswered request.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Replaces the default reply.
    pub fn set_default(&self, reply: MockReply) {
        *self.default_reply.lock() = reply;
    }

    /// Requests received so far.
    pub fn sent(&self) -> Vec<FlushRequest> {
        self.sent.lock().clone()
    }

    /// Guids of the requests received so far, in order.
    pub fn sent_guids(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.guid().to_string()).collect()
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MockRemote {
    fn send(&self, request: &FlushRequest) -> SyncResult<RemoteResponse> {
        self.sent.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.lock().clone());
        match reply {
            MockReply::Status(status) => Ok(RemoteResponse::new(status)),
            MockReply::NetworkError(message) => Err(SyncError::transport_retryable(message)),
        }
    }
}
