//! # Connection handle and its transport-side counterpart.
//!
//! [`ConnectionHandle::new`] creates a connected pair:
//! - [`ConnectionHandle`] for the service (payload, supervisors, teardown),
//! - [`TransportEnd`] for the transport implementation.
//!
//! ## Rules
//! - The `closed` signal is set **exactly once**, by the [`ClosedNotifier`],
//!   either explicitly or when the notifier is dropped. Implementations notify
//!   only after the underlying socket is released, so awaiting `closed` in
//!   teardown cannot race a reopen of the same address.
//! - [`ConnectionHandle::close`] only *requests* a close; observe
//!   [`ConnectionHandle::wait_closed`] for the confirmation.
//! - Handles are cheap to clone; all clones refer to the same connection.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::ConnectError;
use crate::transport::signal::Signal;

static CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    peer: Arc<str>,
    tls: bool,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
    close_requested: CancellationToken,
    closed: Signal,
}

/// The service's side of an open transport.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("tls", &self.inner.tls)
            .field("closed", &self.inner.closed.is_set())
            .finish()
    }
}

/// The transport implementation's side of a connection.
///
/// Fields are public so implementations can move them into their I/O tasks.
pub struct TransportEnd {
    /// Frames the service wants written to the wire.
    pub outbound: mpsc::Receiver<Vec<u8>>,
    /// Frames read from the wire, delivered to the service.
    pub inbound: mpsc::Sender<Vec<u8>>,
    /// Cancelled when the service asks for the connection to be closed.
    pub close_requested: CancellationToken,
    /// Sets the handle's `closed` signal.
    pub closed: ClosedNotifier,
}

/// Sets a connection's `closed` signal when notified or dropped.
#[derive(Debug)]
pub struct ClosedNotifier {
    signal: Signal,
}

impl ClosedNotifier {
    /// Reports that the transport is fully released.
    pub fn notify(self) {
        drop(self);
    }
}

impl Drop for ClosedNotifier {
    fn drop(&mut self) {
        self.signal.set();
    }
}

impl ConnectionHandle {
    /// Creates a handle/transport pair for `peer`.
    ///
    /// `capacity` bounds both frame queues (clamped to at least 1).
    pub fn new(peer: impl Into<Arc<str>>, tls: bool, capacity: usize) -> (Self, TransportEnd) {
        let capacity = capacity.max(1);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let close_requested = CancellationToken::new();
        let closed = Signal::new();

        let handle = Self {
            inner: Arc::new(Inner {
                id: CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                peer: peer.into(),
                tls,
                outbound: out_tx,
                inbound: Mutex::new(in_rx),
                close_requested: close_requested.clone(),
                closed: closed.clone(),
            }),
        };
        let end = TransportEnd {
            outbound: out_rx,
            inbound: in_tx,
            close_requested,
            closed: ClosedNotifier { signal: closed },
        };
        (handle, end)
    }

    /// Process-unique connection id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Remote endpoint (`host:port`).
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Whether the transport negotiated TLS.
    pub fn is_tls(&self) -> bool {
        self.inner.tls
    }

    /// Queues a frame for writing.
    ///
    /// Fails once the transport has gone away.
    pub async fn send(&self, frame: impl Into<Vec<u8>>) -> Result<(), ConnectError> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.inner
            .outbound
            .send(frame.into())
            .await
            .map_err(|_| closed_error())
    }

    /// Receives the next inbound frame; `None` once the transport is gone and drained.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.inner.inbound.lock().await.recv().await
    }

    /// Requests the transport to close. Idempotent.
    pub fn close(&self) {
        self.inner.close_requested.cancel();
    }

    /// True once a close was requested on this connection.
    pub fn is_closing(&self) -> bool {
        self.inner.close_requested.is_cancelled()
    }

    /// The one-shot "closed" signal.
    pub fn closed(&self) -> &Signal {
        &self.inner.closed
    }

    /// True once the transport reported its release.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_set()
    }

    /// Waits until the transport reported its release.
    pub async fn wait_closed(&self) {
        self.inner.closed.wait().await
    }
}

fn closed_error() -> ConnectError {
    ConnectError::Transport {
        kind: std::io::ErrorKind::NotConnected,
        reason: "connection closed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (handle, mut end) = ConnectionHandle::new("h:1", false, 4);
        handle.send(b"ping".to_vec()).await.unwrap();
        assert_eq!(end.outbound.recv().await.unwrap(), b"ping");

        end.inbound.send(b"pong".to_vec()).await.unwrap();
        assert_eq!(handle.recv().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn dropping_the_end_sets_closed_once() {
        let (handle, end) = ConnectionHandle::new("h:1", false, 4);
        assert!(!handle.is_closed());
        drop(end);
        handle.wait_closed().await;
        assert!(handle.is_closed());
        assert!(!handle.closed().set());
        assert!(handle.send(b"late".to_vec()).await.is_err());
        assert_eq!(handle.recv().await, None);
    }

    #[tokio::test]
    async fn close_is_a_request_observed_by_the_transport() {
        let (handle, end) = ConnectionHandle::new("h:1", false, 4);
        let TransportEnd {
            close_requested,
            closed,
            ..
        } = end;
        handle.close();
        handle.close();
        assert!(handle.is_closing());
        close_requested.cancelled().await;
        assert!(!handle.is_closed());
        closed.notify();
        assert!(handle.is_closed());
    }

    #[test]
    fn ids_are_unique() {
        let (a, _ea) = ConnectionHandle::new("h:1", false, 1);
        let (b, _eb) = ConnectionHandle::new("h:1", true, 1);
        assert_ne!(a.id(), b.id());
        assert!(b.is_tls());
    }
}
