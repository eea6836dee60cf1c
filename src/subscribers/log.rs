//! # LogWriter: events rendered through `tracing`.
//!
//! The default subscriber of every service. Each event becomes one `tracing`
//! record with structured fields; install any `tracing` subscriber
//! (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Levels
//! - `error`: setup failed, retries exhausted, payload failed, subscriber panicked
//! - `warn`: connect failed, connection lost, session failed, teardown failed, overflow
//! - `info`: connected, session joined, stop requested, watchdog fired, stopped
//! - `debug`: everything else

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let peer = e.peer.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::StateChanged => {
                debug!(service, state = ?e.state, "state changed");
            }
            EventKind::StopRequested => {
                info!(service, reason, "stop requested");
            }
            EventKind::WatchdogFired => {
                info!(service, reason, "watchdog fired");
            }
            EventKind::SetupFailed => {
                error!(service, reason, "setup failed, stopping immediately");
            }
            EventKind::TeardownStarted => {
                debug!(service, "teardown started");
            }
            EventKind::TransportClosed => {
                debug!(service, peer, "transport closed");
            }
            EventKind::TeardownFailed => {
                warn!(service, reason, "teardown problem");
            }
            EventKind::Stopped => {
                info!(service, state = ?e.state, reason, "service is now shut down");
            }
            EventKind::ConnectAttempt => {
                debug!(service, peer, attempt = ?e.attempt, "attempting connect");
            }
            EventKind::Connected => {
                info!(service, peer, attempt = ?e.attempt, "connected");
            }
            EventKind::ConnectFailed => {
                warn!(service, peer, attempt = ?e.attempt, reason, "connect failed");
            }
            EventKind::BackoffScheduled => {
                debug!(service, peer, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "retry scheduled");
            }
            EventKind::RetriesExhausted => {
                error!(service, peer, attempts = ?e.attempt, reason, "giving up on connect");
            }
            EventKind::ConnectionLost => {
                warn!(service, peer, "connection lost");
            }
            EventKind::SessionJoined => {
                info!(service, peer, "session joined");
            }
            EventKind::SessionFailed => {
                warn!(service, peer, timeout_ms = ?e.timeout_ms, reason, "session handshake failed");
            }
            EventKind::PayloadStarting => {
                debug!(service, run = ?e.attempt, "payload starting");
            }
            EventKind::PayloadCompleted => {
                info!(service, run = ?e.attempt, "payload completed");
            }
            EventKind::PayloadCancelled => {
                info!(service, run = ?e.attempt, "payload cancelled");
            }
            EventKind::PayloadFailed => {
                error!(service, run = ?e.attempt, reason, "payload failure");
            }
            EventKind::PayloadRestartScheduled => {
                info!(service, run = ?e.attempt, delay_ms = ?e.delay_ms, "payload restart scheduled");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = service, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = service, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
