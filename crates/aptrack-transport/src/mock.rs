//! A scripted, in-memory transport for tests.
//!
//! [`MockConnector`] hands out [`MockConnection`]s that replay frames
//! queued with [`MockConnector::push_text`] / [`MockConnector::push_close`]
//! and record everything the client sends. Frames may be queued before
//! or after the connection opens; `recv` waits until one is available.
//!
//! All clones of a connector share the same script, so a test keeps one
//! clone as a remote control while the code under test owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{
    CloseReason, Connection, ConnectionId, Connector, Received,
    TransportError,
};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct Script {
    inbound: Mutex<VecDeque<Received>>,
    sent: Mutex<Vec<String>>,
    connect_failure: Mutex<Option<String>>,
    arrived: Notify,
    closed: AtomicBool,
    connects: AtomicUsize,
}

/// Locks a std mutex, recovering the data if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`Connector`] whose connections are driven by a test script.
#[derive(Clone, Default)]
pub struct MockConnector {
    script: Arc<Script>,
}

impl MockConnector {
    /// Creates a connector with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an inbound text frame.
    pub fn push_text(&self, text: impl Into<String>) {
        lock(&self.script.inbound).push_back(Received::Text(text.into()));
        self.script.arrived.notify_one();
    }

    /// Queues a remote close.
    pub fn push_close(&self, code: u16, reason: impl Into<String>) {
        lock(&self.script.inbound).push_back(Received::Closed(CloseReason {
            code,
            reason: reason.into(),
        }));
        self.script.arrived.notify_one();
    }

    /// Makes the next `connect` call fail with `message`.
    pub fn fail_next_connect(&self, message: impl Into<String>) {
        *lock(&self.script.connect_failure) = Some(message.into());
    }

    /// Every frame sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.script.sent).clone()
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.script.connects.load(Ordering::SeqCst)
    }

    /// Whether the most recent connection was closed locally.
    pub fn is_closed(&self) -> bool {
        self.script.closed.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(
        &self,
        url: &str,
    ) -> Result<Self::Connection, TransportError> {
        if let Some(message) = lock(&self.script.connect_failure).take() {
            return Err(TransportError::ConnectFailed {
                url: url.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    message,
                ),
            });
        }
        self.script.closed.store(false, Ordering::SeqCst);
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id: ConnectionId::new(NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed)),
            script: Arc::clone(&self.script),
        })
    }
}

/// A connection produced by [`MockConnector`].
pub struct MockConnection {
    id: ConnectionId,
    script: Arc<Script>,
}

impl Connection for MockConnection {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.script.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed(
                "mock connection closed".into(),
            ));
        }
        lock(&self.script.sent).push(text.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<Received, TransportError> {
        loop {
            // Register interest before checking the queue so a push that
            // lands in between is not missed.
            let arrived = self.script.arrived.notified();
            if let Some(next) = lock(&self.script.inbound).pop_front() {
                return Ok(next);
            }
            arrived.await;
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.script.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
