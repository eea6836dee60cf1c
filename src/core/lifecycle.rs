//! # Lifecycle task: one run from setup to teardown.
//!
//! ```text
//! run()
//!   ├─► subscriber listener (Bus → SubscriberSet)
//!   ├─► watchdog task ── fires → publish WatchdogFired, cancel closing
//!   ├─► SettingUp → Connecting ─► ReconnectSupervisor::open
//!   │                         └─► [Joining] SessionMonitor::join
//!   │                               └─► transport lost → attempt_failed, connect again
//!   │     ├─► Err → report setup error ───────────────────────────────┐
//!   │     └─► Ok  → report setup Ok, Running                         │
//!   ├─► run phase (select, biased):                                  │
//!   │     closing ─────────────► leave                               │
//!   │     connection closed ───► ConnectionLost; closing? leave       │
//!   │                            stop payload, Reconnecting, connect  │
//!   │     payload ended ───────► RestartPolicy: schedule or leave     │
//!   │     restart delay over ──► next payload run                     │
//!   ├─► teardown (exactly once, bounded) ◄────────────────────────────┘
//!   │     cancel closing, stop payload, close transport and wait for
//!   │     `closed`, release watchdog
//!   └─► Stopped | Failed, publish Stopped, drain subscribers, report outcome
//! ```
//!
//! All state (`ServiceStatus`, the connection, the payload task, the retry
//! state) is owned by this task and mutated only here.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::core::service::{Inner, Outcome};
use crate::core::state::{RetryState, ServiceState};
use crate::error::{PayloadError, ServiceError};
use crate::events::{Event, EventKind};
use crate::payload::RunOutcome;
use crate::session::Link;
use crate::subscribers::SubscriberSet;
use crate::transport::ConnectionHandle;
use crate::watchdog::WatchdogExit;

/// A payload run in flight.
struct PayloadTask {
    handle: JoinHandle<RunOutcome>,
    token: CancellationToken,
}

/// What woke the run phase up.
enum Wake {
    Closing,
    ConnectionLost,
    PayloadEnded(RunOutcome),
    RestartDue,
}

pub(crate) struct Lifecycle {
    inner: Arc<Inner>,
    closing: CancellationToken,
    setup_tx: Option<oneshot::Sender<Result<(), ServiceError>>>,
    done_tx: watch::Sender<Outcome>,
    retry: RetryState,
    conn: Option<ConnectionHandle>,
    payload: Option<PayloadTask>,
    runs: u32,
}

impl Lifecycle {
    pub(crate) fn new(
        inner: Arc<Inner>,
        closing: CancellationToken,
        setup_tx: oneshot::Sender<Result<(), ServiceError>>,
        done_tx: watch::Sender<Outcome>,
    ) -> Self {
        let retry = RetryState::new(inner.cfg.max_retries);
        Self {
            inner,
            closing,
            setup_tx: Some(setup_tx),
            done_tx,
            retry,
            conn: None,
            payload: None,
            runs: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        let listener_stop = CancellationToken::new();
        let listener = self.spawn_listener(listener_stop.clone());

        let release = CancellationToken::new();
        let watchdog = self.spawn_watchdog(release.clone());

        self.set_state(ServiceState::SettingUp);
        let (outcome, setup_failed) = match self.setup().await {
            Ok(link) => {
                self.set_state(ServiceState::Running);
                self.report_setup(Ok(()));
                (self.run_phase(link).await, false)
            }
            Err(ServiceError::Cancelled) => {
                self.report_setup(Err(ServiceError::Cancelled));
                (Ok(()), false)
            }
            Err(e) => {
                let err = ServiceError::SetupFailed(Box::new(e));
                self.publish(Event::new(EventKind::SetupFailed).with_reason(err.to_string()));
                self.report_setup(Err(err.clone()));
                (Err(err), true)
            }
        };

        self.teardown(watchdog, release).await;

        let final_state = if setup_failed {
            ServiceState::Failed
        } else {
            ServiceState::Stopped
        };
        self.set_state(final_state);
        let mut stopped = Event::new(EventKind::Stopped).with_state(final_state);
        if let Err(e) = &outcome {
            stopped = stopped.with_reason(e.to_string());
        }
        self.publish(stopped);

        listener_stop.cancel();
        if timeout(self.inner.cfg.grace, listener).await.is_err() {
            tracing::warn!(service = %self.inner.name, "subscribers did not drain within grace");
        }
        self.done_tx.send_replace(Some(outcome));
    }

    // ---- setup ------------------------------------------------------------

    async fn setup(&mut self) -> Result<Link, ServiceError> {
        match self.inner.cfg.setup_timeout() {
            None => self.establish(false).await,
            Some(limit) => match timeout(limit, self.establish(false)).await {
                Ok(res) => res,
                Err(_elapsed) => Err(ServiceError::SetupTimeout { timeout: limit }),
            },
        }
    }

    /// One connection cycle plus the optional handshake.
    ///
    /// The connection is recorded before the handshake starts so that
    /// teardown closes it whatever happens next. A connection lost during the
    /// handshake counts as a failed attempt of the same cycle; the retry
    /// state is reset only once the whole attempt succeeds.
    async fn establish(&mut self, reconnect: bool) -> Result<Link, ServiceError> {
        let connecting = if reconnect {
            ServiceState::Reconnecting
        } else {
            ServiceState::Connecting
        };

        loop {
            self.set_state(connecting);
            let res = self
                .inner
                .reconnect
                .open(&mut self.retry, &self.closing)
                .await;
            self.sync_attempts();
            let conn = res?;
            self.conn = Some(conn.clone());

            let Some(monitor) = self.inner.session.clone() else {
                self.retry.reset();
                self.sync_attempts();
                return Ok(Link::Connection(conn));
            };
            self.set_state(ServiceState::Joining);
            let res = tokio::select! {
                biased;
                _ = self.closing.cancelled() => return Err(ServiceError::Cancelled),
                res = monitor.join(conn.clone()) => res,
            };

            match res {
                Ok(session) => {
                    self.retry.reset();
                    self.sync_attempts();
                    return Ok(Link::Session(session));
                }
                Err(e)
                    if conn.is_closed() && !matches!(e, ServiceError::SessionTimeout { .. }) =>
                {
                    conn.close();
                    self.conn = None;
                    let res = self
                        .inner
                        .reconnect
                        .attempt_failed(&mut self.retry, e, &self.closing)
                        .await;
                    self.sync_attempts();
                    res?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn sync_attempts(&self) {
        let attempts = self.retry.attempts();
        self.inner.status.send_modify(|s| s.attempts = attempts);
    }

    fn report_setup(&mut self, res: Result<(), ServiceError>) {
        if let Some(tx) = self.setup_tx.take() {
            // The caller may have stopped waiting.
            let _ = tx.send(res);
        }
    }

    // ---- run phase --------------------------------------------------------

    async fn run_phase(&mut self, mut link: Link) -> Result<(), ServiceError> {
        let mut restart_at = Some(Instant::now());

        loop {
            let conn = link.connection().clone();
            let wake = tokio::select! {
                biased;
                _ = self.closing.cancelled() => Wake::Closing,
                _ = conn.wait_closed() => Wake::ConnectionLost,
                outcome = join_payload(&mut self.payload), if self.payload.is_some() => {
                    Wake::PayloadEnded(outcome)
                }
                _ = sleep_until(restart_at.unwrap_or_else(Instant::now)),
                    if restart_at.is_some() && self.payload.is_none() => Wake::RestartDue,
            };

            match wake {
                Wake::Closing => return Ok(()),
                Wake::ConnectionLost => {
                    self.publish(Event::new(EventKind::ConnectionLost).with_peer(conn.peer()));
                    if self.closing.is_cancelled() {
                        return Ok(());
                    }
                    self.stop_payload().await;
                    self.conn = None;
                    self.inner.status.send_modify(|s| s.reconnects += 1);

                    link = match self.establish(true).await {
                        Ok(link) => link,
                        Err(ServiceError::Cancelled) => return Ok(()),
                        Err(e) => return Err(e),
                    };
                    self.set_state(ServiceState::Running);
                    restart_at = Some(Instant::now());
                }
                Wake::PayloadEnded(outcome) => {
                    if self.closing.is_cancelled() {
                        return Ok(());
                    }
                    if self.inner.restart.should_restart(&outcome) {
                        let delay = self.inner.restart.delay;
                        self.publish(
                            Event::new(EventKind::PayloadRestartScheduled)
                                .with_attempt(self.runs)
                                .with_delay(delay),
                        );
                        restart_at = Some(Instant::now() + delay);
                    } else {
                        return match outcome {
                            RunOutcome::Failed(e) => Err(ServiceError::PayloadFailed(e)),
                            RunOutcome::CompletedNormally | RunOutcome::Cancelled => Ok(()),
                        };
                    }
                }
                Wake::RestartDue => {
                    restart_at = None;
                    self.start_payload(link.clone());
                }
            }
        }
    }

    fn start_payload(&mut self, link: Link) {
        self.runs = self.runs.saturating_add(1);
        let run = self.runs;
        let token = self.closing.child_token();
        let ctx = token.clone();
        let runner = self.inner.runner.clone();
        let handle = tokio::spawn(async move { runner.run_once(link, ctx, run).await });
        self.payload = Some(PayloadTask { handle, token });
        self.inner.status.send_modify(|s| s.payload_runs += 1);
    }

    /// Cancels the running payload and waits up to `grace` for it to exit.
    async fn stop_payload(&mut self) {
        let Some(mut task) = self.payload.take() else {
            return;
        };
        task.token.cancel();
        if timeout(self.inner.cfg.grace, &mut task.handle).await.is_err() {
            task.handle.abort();
            tracing::warn!(service = %self.inner.name, "payload ignored cancellation, aborted");
        }
    }

    // ---- teardown ---------------------------------------------------------

    async fn teardown(&mut self, mut watchdog: JoinHandle<WatchdogExit>, release: CancellationToken) {
        self.set_state(ServiceState::TearingDown);
        self.publish(Event::new(EventKind::TeardownStarted));
        self.closing.cancel();

        let budget = self.inner.cfg.teardown_timeout;
        let deadline = Instant::now() + budget;

        if let Some(mut task) = self.payload.take() {
            task.token.cancel();
            let grace = self.inner.cfg.grace;
            let payload_deadline = deadline.min(Instant::now() + grace);
            if timeout_at(payload_deadline, &mut task.handle).await.is_err() {
                task.handle.abort();
                self.teardown_error(format!("payload did not exit within {grace:?}, aborted"));
            }
        }

        if let Some(conn) = self.conn.take() {
            conn.close();
            match timeout_at(deadline, conn.wait_closed()).await {
                Ok(()) => {
                    self.publish(Event::new(EventKind::TransportClosed).with_peer(conn.peer()));
                }
                Err(_elapsed) => self.teardown_error(format!(
                    "transport to {} did not confirm close within {budget:?}",
                    conn.peer()
                )),
            }
        }

        release.cancel();
        match timeout_at(deadline, &mut watchdog).await {
            Ok(Ok(_exit)) => {}
            Ok(Err(e)) => self.teardown_error(format!("watchdog task failed: {e}")),
            Err(_elapsed) => {
                watchdog.abort();
                self.teardown_error("watchdog did not release in time, aborted".to_string());
            }
        }

        self.inner.status.send_modify(|s| s.teardowns += 1);
    }

    fn teardown_error(&self, reason: String) {
        self.inner.status.send_modify(|s| s.teardown_errors += 1);
        self.publish(Event::new(EventKind::TeardownFailed).with_reason(reason));
    }

    // ---- plumbing ---------------------------------------------------------

    fn spawn_watchdog(&self, release: CancellationToken) -> JoinHandle<WatchdogExit> {
        let watchdog = Arc::clone(&self.inner.watchdog);
        let closing = self.closing.clone();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let exit = watchdog.wait(release).await;
            if exit.fired() && !closing.is_cancelled() {
                inner.bus.publish(
                    Event::new(EventKind::WatchdogFired)
                        .with_service(inner.name.clone())
                        .with_reason(exit.reason()),
                );
                closing.cancel();
            }
            exit
        })
    }

    /// Forwards bus events to the subscriber set until `stop`, then drains and shuts it down.
    fn spawn_listener(&self, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.inner.bus.subscribe();
        let set = SubscriberSet::new(self.inner.subscribers.clone(), self.inner.bus.clone());
        let name = self.inner.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(service = %name, skipped, "event listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        })
    }

    fn set_state(&self, state: ServiceState) {
        let changed = self.inner.status.send_if_modified(|s| {
            if s.state == state {
                false
            } else {
                s.state = state;
                true
            }
        });
        if changed {
            self.publish(Event::new(EventKind::StateChanged).with_state(state));
        }
    }

    fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev.with_service(self.inner.name.clone()));
    }
}

/// Awaits the payload task in `slot` and clears it.
///
/// Cancel-safe: dropping the future leaves the task in the slot.
async fn join_payload(slot: &mut Option<PayloadTask>) -> RunOutcome {
    let Some(task) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let res = (&mut task.handle).await;
    *slot = None;
    res.unwrap_or_else(|e| {
        RunOutcome::Failed(PayloadError::fatal(format!("payload task aborted: {e}")))
    })
}
