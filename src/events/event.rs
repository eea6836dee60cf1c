//! # Runtime events emitted by the service components.
//!
//! The [`EventKind`] enum classifies events into:
//! - **Lifecycle events**: state changes, stop requests, teardown
//! - **Connection events**: attempts, failures, backoff, loss, session handshake
//! - **Payload events**: runs starting, ending, restarts
//! - **Subscriber events**: overflow and panics in event consumers
//!
//! The [`Event`] struct carries optional metadata (service name, peer,
//! attempt, delay, timeout, reason, state) set depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a process-wide unique sequence number (`seq`) that increases
//! monotonically; use it to restore the order of events delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_service("feed")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(500))
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.delay_ms, Some(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::ServiceState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// The lifecycle supervisor moved to a new state.
    ///
    /// Sets: `state`.
    StateChanged,

    /// `stop()` (or `request_stop()`) was called.
    ///
    /// Sets: `reason`.
    StopRequested,

    /// The watchdog completed.
    ///
    /// Sets: `reason`.
    WatchdogFired,

    /// Setup failed; teardown follows.
    ///
    /// Sets: `reason`.
    SetupFailed,

    /// Teardown sequence started.
    TeardownStarted,

    /// The transport confirmed its close during teardown.
    ///
    /// Sets: `peer`.
    TransportClosed,

    /// A teardown step failed or ran over budget (non-fatal).
    ///
    /// Sets: `reason`.
    TeardownFailed,

    /// The run is over; the service is stopped (or failed).
    ///
    /// Sets: `state`, `reason` (final error, if any).
    Stopped,

    // === Connection ===
    /// A connection attempt is starting.
    ///
    /// Sets: `peer`, `attempt` (1-based within the current reconnect cycle).
    ConnectAttempt,

    /// A connection attempt succeeded.
    ///
    /// Sets: `peer`, `attempt`.
    Connected,

    /// A connection attempt failed.
    ///
    /// Sets: `peer`, `attempt`, `reason`.
    ConnectFailed,

    /// Next connection attempt scheduled.
    ///
    /// Sets: `peer`, `attempt` (failed attempts so far), `delay_ms`, `reason`.
    BackoffScheduled,

    /// The retry policy gave up.
    ///
    /// Sets: `peer`, `attempt`, `reason`.
    RetriesExhausted,

    /// The open connection reported its closed signal.
    ///
    /// Sets: `peer`.
    ConnectionLost,

    /// The application-level handshake completed.
    ///
    /// Sets: `peer`.
    SessionJoined,

    /// The application-level handshake failed or timed out.
    ///
    /// Sets: `peer`, `reason`, `timeout_ms` (on timeout).
    SessionFailed,

    // === Payload ===
    /// A payload run is starting.
    ///
    /// Sets: `attempt` (run number).
    PayloadStarting,

    /// A payload run completed normally.
    ///
    /// Sets: `attempt`.
    PayloadCompleted,

    /// A payload run ended because it was cancelled.
    ///
    /// Sets: `attempt`.
    PayloadCancelled,

    /// A payload run failed.
    ///
    /// Sets: `attempt`, `reason`.
    PayloadFailed,

    /// A payload restart was scheduled.
    ///
    /// Sets: `attempt` (previous run), `delay_ms`.
    PayloadRestartScheduled,

    // === Subscribers ===
    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `service` (subscriber name), `reason`.
    SubscriberOverflow,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `service` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the service (or subscriber) the event belongs to.
    pub service: Option<Arc<str>>,
    /// Remote endpoint (`host:port`).
    pub peer: Option<Arc<str>>,
    /// Attempt or run number.
    pub attempt: Option<u32>,
    /// Delay before the next attempt/run, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Timeout that was hit, in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, signal names, ...).
    pub reason: Option<Arc<str>>,
    /// Lifecycle state, for state-related events.
    pub state: Option<ServiceState>,
}

impl Event {
    /// Creates an event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            peer: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            state: None,
        }
    }

    /// Attaches the service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches the remote endpoint.
    #[inline]
    pub fn with_peer(mut self, peer: impl Into<Arc<str>>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Attaches an attempt or run number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a lifecycle state.
    #[inline]
    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }

    /// True for events about subscribers themselves.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[inline]
fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
