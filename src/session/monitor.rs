//! # Session monitor: bounded wait for the "joined" signal.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::session::link::SessionHandle;
use crate::session::negotiator::NegotiatorRef;
use crate::transport::ConnectionHandle;

/// Waits for an application-level handshake on top of an open connection.
///
/// On failure the connection is left open; closing it is the caller's decision.
#[derive(Clone)]
pub struct SessionMonitor {
    negotiator: NegotiatorRef,
    join_timeout: Duration,
    bus: Bus,
    service: Arc<str>,
}

impl SessionMonitor {
    /// Creates a monitor publishing to `bus` under the `service` name.
    pub fn new(
        negotiator: NegotiatorRef,
        join_timeout: Duration,
        bus: Bus,
        service: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            negotiator,
            join_timeout,
            bus,
            service: service.into(),
        }
    }

    /// The handshake bound.
    pub fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    /// Runs the handshake on `conn`.
    ///
    /// Resolves with a [`SessionHandle`] once "joined" is set. Fails with
    /// [`ServiceError::SessionTimeout`] when `join_timeout` elapses first and
    /// with [`ServiceError::TransportError`] when the connection closes first.
    pub async fn join(&self, conn: ConnectionHandle) -> Result<SessionHandle, ServiceError> {
        let handshake = async {
            let joined = self.negotiator.begin(&conn).await?;
            tokio::select! {
                biased;
                _ = joined.wait() => Ok(joined),
                _ = conn.wait_closed() => Err(ServiceError::TransportError {
                    reason: "connection closed during session handshake".to_string(),
                }),
            }
        };

        let res = match tokio::time::timeout(self.join_timeout, handshake).await {
            Ok(res) => res,
            Err(_elapsed) => Err(ServiceError::SessionTimeout {
                timeout: self.join_timeout,
            }),
        };

        match res {
            Ok(joined) => {
                self.bus.publish(
                    Event::new(EventKind::SessionJoined)
                        .with_service(self.service.clone())
                        .with_peer(conn.peer()),
                );
                Ok(SessionHandle::new(conn, joined))
            }
            Err(e) => {
                let mut ev = Event::new(EventKind::SessionFailed)
                    .with_service(self.service.clone())
                    .with_peer(conn.peer())
                    .with_reason(e.to_string());
                if let ServiceError::SessionTimeout { timeout } = &e {
                    ev = ev.with_timeout(*timeout);
                }
                self.bus.publish(ev);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NegotiatorFn;
    use crate::transport::Signal;

    fn never_joins() -> NegotiatorRef {
        NegotiatorFn::arc(|_conn: ConnectionHandle| async { Ok::<_, ServiceError>(Signal::new()) })
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_leaves_the_connection_open() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let monitor = SessionMonitor::new(never_joins(), Duration::from_secs(1), bus, "svc");
        let (conn, _end) = ConnectionHandle::new("h:1", false, 4);

        let err = monitor.join(conn.clone()).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::SessionTimeout {
                timeout: Duration::from_secs(1)
            }
        );
        assert!(!conn.is_closed());
        assert!(!conn.is_closing());

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SessionFailed);
        assert_eq!(ev.timeout_ms, Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_connection_fails_fast() {
        let monitor = SessionMonitor::new(never_joins(), Duration::from_secs(60), Bus::new(4), "svc");
        let (conn, end) = ConnectionHandle::new("h:1", false, 4);
        drop(end);

        let err = monitor.join(conn).await.unwrap_err();
        assert_eq!(err.as_label(), "transport_error");
    }

    #[tokio::test]
    async fn joined_signal_yields_a_session() {
        let n = NegotiatorFn::arc(|_conn: ConnectionHandle| async {
            let joined = Signal::new();
            let later = joined.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                later.set();
            });
            Ok::<_, ServiceError>(joined)
        });
        let monitor = SessionMonitor::new(n, Duration::from_secs(5), Bus::new(4), "svc");
        let (conn, _end) = ConnectionHandle::new("h:1", false, 4);

        let session = monitor.join(conn).await.unwrap();
        assert!(session.is_joined());
        assert_eq!(session.connection().peer(), "h:1");
    }
}
