//! # ReconnectSupervisor: connect under a retry policy.
//!
//! Drives the [`Connector`](crate::Connector) until it yields a connection,
//! the retry policy gives up, or the closing token is cancelled.
//!
//! ```text
//! loop {
//!   ├─► closing? → Err(Cancelled)
//!   ├─► publish ConnectAttempt
//!   ├─► connect_bounded() raced against closing
//!   │     ├─► Ok   → publish Connected, return the handle
//!   │     └─► Err  → attempt_failed()
//! }
//! connect() = open() + reset RetryState
//!
//! attempt_failed()
//!   ├─► record failure, publish ConnectFailed
//!   ├─► cap reached or policy gives up → publish RetriesExhausted, Err(RetriesExhausted)
//!   └─► publish BackoffScheduled, sleep(delay) raced against closing
//! ```
//!
//! ## Rules
//! - Closing is checked **before** every attempt and raced with every await.
//! - A connection that completes after closing was requested is closed, not returned.
//! - Cancellation is not an error to report: the caller maps `Cancelled` to a clean stop.
//! - The cap is enforced here too, so a custom policy cannot exceed it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EndpointConfig;
use crate::core::state::RetryState;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryRef;
use crate::transport::{ConnectionHandle, ConnectorRef, connect_bounded};

/// Connects to one endpoint with retries.
#[derive(Clone)]
pub struct ReconnectSupervisor {
    connector: ConnectorRef,
    retry: RetryRef,
    endpoint: EndpointConfig,
    bus: Bus,
    service: Arc<str>,
    peer: Arc<str>,
}

impl ReconnectSupervisor {
    /// Creates a supervisor publishing to `bus` under the `service` name.
    pub fn new(
        connector: ConnectorRef,
        retry: RetryRef,
        endpoint: EndpointConfig,
        bus: Bus,
        service: impl Into<Arc<str>>,
    ) -> Self {
        let peer = endpoint.address().into();
        Self {
            connector,
            retry,
            endpoint,
            bus,
            service: service.into(),
            peer,
        }
    }

    /// The endpoint this supervisor connects to.
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Runs one connection cycle.
    ///
    /// `state` carries the consecutive failures and is reset on success.
    pub async fn connect(
        &self,
        state: &mut RetryState,
        closing: &CancellationToken,
    ) -> Result<ConnectionHandle, ServiceError> {
        let conn = self.open(state, closing).await?;
        state.reset();
        Ok(conn)
    }

    /// Like [`connect`](Self::connect), but leaves `state` untouched on success.
    ///
    /// For attempts with a later stage that can still fail, such as a session
    /// handshake: the caller resets `state` once that stage succeeds, or counts
    /// its failure with [`attempt_failed`](Self::attempt_failed).
    pub async fn open(
        &self,
        state: &mut RetryState,
        closing: &CancellationToken,
    ) -> Result<ConnectionHandle, ServiceError> {
        loop {
            if closing.is_cancelled() {
                return Err(ServiceError::Cancelled);
            }

            let attempt = state.next_attempt();
            self.publish(Event::new(EventKind::ConnectAttempt).with_attempt(attempt));

            let res = tokio::select! {
                biased;
                _ = closing.cancelled() => return Err(ServiceError::Cancelled),
                res = connect_bounded(self.connector.as_ref(), &self.endpoint) => res,
            };

            match res {
                Ok(conn) => {
                    if closing.is_cancelled() {
                        conn.close();
                        return Err(ServiceError::Cancelled);
                    }
                    self.publish(Event::new(EventKind::Connected).with_attempt(attempt));
                    return Ok(conn);
                }
                Err(e) => {
                    self.attempt_failed(state, ServiceError::from(e), closing)
                        .await?
                }
            }
        }
    }

    /// Counts a failed attempt and waits out the policy's delay.
    ///
    /// Fails with [`ServiceError::RetriesExhausted`] once the cap is reached
    /// or the policy gives up, and with [`ServiceError::Cancelled`] when
    /// closing fires during the delay.
    pub async fn attempt_failed(
        &self,
        state: &mut RetryState,
        err: ServiceError,
        closing: &CancellationToken,
    ) -> Result<(), ServiceError> {
        let attempt = state.next_attempt();
        let failures = state.record_failure();
        let reason = err.to_string();
        self.publish(
            Event::new(EventKind::ConnectFailed)
                .with_attempt(attempt)
                .with_reason(reason.as_str()),
        );

        let decision = self.retry.next_delay(failures, state.max_attempts());
        if state.exhausted() || !decision.should_retry {
            self.publish(
                Event::new(EventKind::RetriesExhausted)
                    .with_attempt(failures)
                    .with_reason(reason),
            );
            return Err(ServiceError::RetriesExhausted {
                attempts: failures,
                last: Box::new(err),
            });
        }

        self.publish(
            Event::new(EventKind::BackoffScheduled)
                .with_attempt(failures)
                .with_delay(decision.delay)
                .with_reason(reason),
        );
        tokio::select! {
            biased;
            _ = closing.cancelled() => Err(ServiceError::Cancelled),
            _ = tokio::time::sleep(decision.delay) => Ok(()),
        }
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(
            ev.with_service(self.service.clone())
                .with_peer(self.peer.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectError;
    use crate::policies::{BackoffPolicy, ConstantDelay, JitterPolicy};
    use crate::transport::ConnectorFn;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn refusing(counter: Arc<AtomicU32>) -> ConnectorRef {
        ConnectorFn::arc(move |ep: EndpointConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<ConnectionHandle, _>(ConnectError::Refused {
                    endpoint: ep.address(),
                })
            }
        })
    }

    fn supervisor(connector: ConnectorRef, retry: RetryRef) -> (ReconnectSupervisor, Bus) {
        let bus = Bus::new(256);
        let ep = EndpointConfig::new("127.0.0.1", 7);
        (
            ReconnectSupervisor::new(connector, retry, ep, bus.clone(), "svc"),
            bus,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_exactly_max_attempts() {
        for max in [1u32, 2, 5] {
            let calls = Arc::new(AtomicU32::new(0));
            let (sup, _bus) = supervisor(
                refusing(calls.clone()),
                Arc::new(ConstantDelay::new(Duration::from_millis(10))),
            );
            let mut state = RetryState::new(max);

            let err = sup.connect(&mut state, &CancellationToken::new()).await.unwrap_err();
            match err {
                ServiceError::RetriesExhausted { attempts, last } => {
                    assert_eq!(attempts, max);
                    assert_eq!(last.as_label(), "connection_refused");
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(calls.load(Ordering::SeqCst), max);
            assert_eq!(state.attempts(), max);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_lenient_policy_cannot_exceed_the_cap() {
        struct Forever;
        impl crate::policies::RetryPolicy for Forever {
            fn next_delay(&self, _a: u32, _m: u32) -> crate::policies::RetryDecision {
                crate::policies::RetryDecision::retry_after(Duration::ZERO)
            }
        }
        let calls = Arc::new(AtomicU32::new(0));
        let (sup, _bus) = supervisor(refusing(calls.clone()), Arc::new(Forever));
        let mut state = RetryState::new(4);

        assert!(sup.connect(&mut state, &CancellationToken::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_are_published() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        let (sup, bus) = supervisor(refusing(calls), Arc::new(policy));
        let mut rx = bus.subscribe();
        let mut state = RetryState::new(4);
        let _ = sup.connect(&mut state, &CancellationToken::new()).await;

        let mut delays = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::BackoffScheduled {
                delays.push(ev.delay_ms.unwrap_or_default());
            }
        }
        assert_eq!(delays, vec![100, 200, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_cancels_a_pending_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let (sup, _bus) = supervisor(
            refusing(calls.clone()),
            Arc::new(ConstantDelay::new(Duration::from_secs(3600))),
        );
        let closing = CancellationToken::new();
        let trigger = closing.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let mut state = RetryState::new(0);
        let err = sup.connect(&mut state, &closing).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_resets_the_state() {
        let c = ConnectorFn::arc(|ep: EndpointConfig| async move {
            let (conn, end) = ConnectionHandle::new(ep.address(), false, 1);
            std::mem::forget(end);
            Ok(conn)
        });
        let (sup, _bus) = supervisor(c, Arc::new(ConstantDelay::default()));
        let mut state = RetryState::new(3);
        state.record_failure();
        state.record_failure();

        let conn = sup.connect(&mut state, &CancellationToken::new()).await.unwrap();
        assert_eq!(state.attempts(), 0);
        assert_eq!(conn.peer(), "127.0.0.1:7");
    }

    #[tokio::test(start_paused = true)]
    async fn open_keeps_the_count_for_a_later_failure() {
        let c = ConnectorFn::arc(|ep: EndpointConfig| async move {
            let (conn, end) = ConnectionHandle::new(ep.address(), false, 1);
            std::mem::forget(end);
            Ok(conn)
        });
        let (sup, _bus) = supervisor(c, Arc::new(ConstantDelay::new(Duration::from_millis(10))));
        let closing = CancellationToken::new();
        let mut state = RetryState::new(2);

        sup.open(&mut state, &closing).await.unwrap();
        let lost = || ServiceError::TransportError {
            reason: "closed".to_string(),
        };
        sup.attempt_failed(&mut state, lost(), &closing).await.unwrap();
        assert_eq!(state.attempts(), 1);

        sup.open(&mut state, &closing).await.unwrap();
        let err = sup.attempt_failed(&mut state, lost(), &closing).await.unwrap_err();
        assert!(matches!(err, ServiceError::RetriesExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn already_closing_makes_no_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let (sup, _bus) = supervisor(refusing(calls.clone()), Arc::new(ConstantDelay::default()));
        let closing = CancellationToken::new();
        closing.cancel();

        let err = sup.connect(&mut RetryState::new(0), &closing).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
