//! Transport layer abstraction for delivering operations.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use offsync_protocol::SyncRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How the server answered a single delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The server applied the operation (2xx).
    Accepted,
    /// The server reported a version clash (409) with its current state.
    Conflict {
        /// The server's current state of the entity.
        server_data: Value,
    },
    /// The server refused the operation with any other status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },
}

/// A sync transport delivers one operation to the remote endpoint.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
///
/// Errors are interpreted by the sync driver: retryable errors mark the
/// single operation as failed, non-retryable transport errors dead-letter
/// it, and protocol and codec errors abort the whole pass.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Submits one operation.
    async fn submit(&self, request: &SyncRequest) -> SyncResult<DeliveryOutcome>;
}

/// A scripted reply of the [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Answer 2xx.
    Accept,
    /// Answer 409 with the given server state.
    Conflict(Value),
    /// Answer with a non-conflict error status.
    Status(u16),
    /// Fail at the transport level.
    NetworkError(String),
    /// Fail at the transport level in a way retrying cannot fix.
    FatalError(String),
    /// Answer with a body the driver cannot parse.
    Malformed(String),
}

impl MockReply {
    fn into_result(self) -> SyncResult<DeliveryOutcome> {
        match self {
            MockReply::Accept => Ok(DeliveryOutcome::Accepted),
            MockReply::Conflict(server_data) => Ok(DeliveryOutcome::Conflict { server_data }),
            MockReply::Status(status) => Ok(DeliveryOutcome::Rejected {
                status,
                message: format!("HTTP {status}"),
            }),
            MockReply::NetworkError(message) => Err(SyncError::transport_retryable(message)),
            MockReply::FatalError(message) => Err(SyncError::transport_fatal(message)),
            MockReply::Malformed(message) => Err(SyncError::Protocol(message)),
        }
    }
}

/// A mock transport for testing.
///
/// Replies are taken from the per-resource script first, then from the
/// default reply (initially [`MockReply::Accept`]). Every submitted request
/// is recorded in order.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    default_reply: Mutex<MockReply>,
    scripted: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<SyncRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a connected mock transport that accepts everything.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            default_reply: Mutex::new(MockReply::Accept),
            scripted: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Sets the reply used when no scripted reply is queued.
    pub fn set_default_reply(&self, reply: MockReply) {
        *self.default_reply.lock() = reply;
    }

    /// Queues a one-shot reply for the next delivery to `resource`.
    pub fn push_reply(&self, resource: impl Into<String>, reply: MockReply) {
        self.scripted
            .lock()
            .entry(resource.into())
            .or_default()
            .push_back(reply);
    }

    /// Sets the connected state. A disconnected mock fails every submit.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delays every reply, simulating a slow network.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Returns every request submitted so far.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests submitted so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self, resource: &str) -> MockReply {
        let scripted = self
            .scripted
            .lock()
            .get_mut(resource)
            .and_then(|replies| replies.pop_front());
        scripted.unwrap_or_else(|| self.default_reply.lock().clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn submit(&self, request: &SyncRequest) -> SyncResult<DeliveryOutcome> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }

        self.requests.lock().push(request.clone());
        self.next_reply(&request.resource).into_result()
    }
}
