//! # Session negotiators.
//!
//! A [`Negotiator`] kicks off the handshake on a fresh connection and hands
//! back the "joined" signal. It must not block until the handshake completes:
//! waiting (and bounding the wait) is [`SessionMonitor`](crate::SessionMonitor)'s job.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::transport::{ConnectionHandle, Signal};

/// Starts an application-level handshake.
#[async_trait]
pub trait Negotiator: Send + Sync + 'static {
    /// Begins the handshake on `conn` and returns the signal set once it completes.
    async fn begin(&self, conn: &ConnectionHandle) -> Result<Signal, ServiceError>;

    /// Short negotiator name for logs.
    fn name(&self) -> &'static str {
        "negotiator"
    }
}

/// Shared handle to a negotiator.
pub type NegotiatorRef = Arc<dyn Negotiator>;

/// Closure-backed negotiator.
///
/// # Example
/// ```rust
/// use linkvisor::{ConnectionHandle, NegotiatorFn, NegotiatorRef, ServiceError, Signal};
///
/// // Treats every connection as joined right away.
/// let n: NegotiatorRef = NegotiatorFn::arc(|_conn: ConnectionHandle| async {
///     let joined = Signal::new();
///     joined.set();
///     Ok::<_, ServiceError>(joined)
/// });
/// assert_eq!(n.name(), "negotiator_fn");
/// ```
#[derive(Debug)]
pub struct NegotiatorFn<F> {
    f: F,
}

impl<F> NegotiatorFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Negotiator for NegotiatorFn<F>
where
    F: Fn(ConnectionHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Signal, ServiceError>> + Send + 'static,
{
    async fn begin(&self, conn: &ConnectionHandle) -> Result<Signal, ServiceError> {
        (self.f)(conn.clone()).await
    }

    fn name(&self) -> &'static str {
        "negotiator_fn"
    }
}

/// Sends a hello frame and waits for an acknowledgment frame.
///
/// Inbound frames are consumed until one starts with `expect_prefix`; frames
/// arriving before the acknowledgment are discarded. The reader task ends
/// when the acknowledgment arrives or the connection goes away.
#[derive(Clone, Debug)]
pub struct GreetingNegotiator {
    hello: Vec<u8>,
    expect_prefix: Vec<u8>,
}

impl GreetingNegotiator {
    /// Creates a negotiator sending `hello` and expecting a reply starting with `expect_prefix`.
    pub fn new(hello: impl Into<Vec<u8>>, expect_prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            hello: hello.into(),
            expect_prefix: expect_prefix.into(),
        }
    }
}

#[async_trait]
impl Negotiator for GreetingNegotiator {
    async fn begin(&self, conn: &ConnectionHandle) -> Result<Signal, ServiceError> {
        conn.send(self.hello.clone()).await?;

        let joined = Signal::new();
        let reader = conn.clone();
        let prefix = self.expect_prefix.clone();
        let signal = joined.clone();
        tokio::spawn(async move {
            while let Some(frame) = reader.recv().await {
                if frame.starts_with(&prefix) {
                    signal.set();
                    break;
                }
                tracing::trace!(peer = reader.peer(), len = frame.len(), "discarding pre-session frame");
            }
        });

        Ok(joined)
    }

    fn name(&self) -> &'static str {
        "greeting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_joins_on_matching_reply() {
        let (conn, mut end) = ConnectionHandle::new("h:1", false, 4);
        let n = GreetingNegotiator::new(b"HELLO".to_vec(), b"WELCOME".to_vec());

        let joined = n.begin(&conn).await.unwrap();
        assert_eq!(end.outbound.recv().await.unwrap(), b"HELLO");
        assert!(!joined.is_set());

        end.inbound.send(b"NOISE".to_vec()).await.unwrap();
        end.inbound.send(b"WELCOME realm".to_vec()).await.unwrap();
        joined.wait().await;
        assert!(joined.is_set());
    }

    #[tokio::test]
    async fn greeting_fails_on_a_closed_connection() {
        let (conn, end) = ConnectionHandle::new("h:1", false, 4);
        drop(end);
        let n = GreetingNegotiator::new(b"HELLO".to_vec(), b"WELCOME".to_vec());
        let err = n.begin(&conn).await.unwrap_err();
        assert_eq!(err.as_label(), "transport_error");
    }
}
