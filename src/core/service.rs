//! # Service: the public face of the lifecycle supervisor.
//!
//! A [`Service`] is built once (see [`ServiceBuilder`](crate::ServiceBuilder))
//! and can then be started and stopped any number of times, one run at a time.
//! Each run is driven by a dedicated lifecycle task; the `Service` handle only
//! signals it and waits for it.
//!
//! ## Deployment modes
//! ```text
//! externally scheduled (caller's tokio runtime):
//!   service.start().await   ── resolves with the setup result
//!   service.wait().await    ── resolves with the final outcome
//!   service.stop().await    ── idempotent; resolves once teardown finished
//!
//! self-scheduled (own current-thread runtime, blocks the caller):
//!   service.run_blocking()  ── start + wait; stop via request_stop() or the watchdog
//! ```
//!
//! ## Outcomes
//! - a deliberate stop (`stop()`, watchdog) is `Ok(())`, in every phase;
//! - setup failures are `Err(SetupFailed(..))` and leave the service `Failed`;
//! - retries exhausted while running, or a payload failure the restart policy
//!   does not cover, end the run with that error and leave it `Stopped`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::core::builder::ServiceBuilder;
use crate::core::lifecycle::Lifecycle;
use crate::core::reconnect::ReconnectSupervisor;
use crate::core::state::ServiceStatus;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};
use crate::payload::PayloadRunner;
use crate::policies::RestartPolicy;
use crate::session::SessionMonitor;
use crate::subscribers::Subscribe;
use crate::watchdog::WatchdogRef;

/// Final outcome slot of one run (`None` while the run is in progress).
pub(crate) type Outcome = Option<Result<(), ServiceError>>;

/// Everything a run needs, shared between the handle and the lifecycle task.
pub(crate) struct Inner {
    pub(crate) cfg: ServiceConfig,
    pub(crate) name: Arc<str>,
    pub(crate) reconnect: ReconnectSupervisor,
    pub(crate) session: Option<SessionMonitor>,
    pub(crate) runner: PayloadRunner,
    pub(crate) restart: RestartPolicy,
    pub(crate) watchdog: WatchdogRef,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) bus: Bus,
    pub(crate) status: watch::Sender<ServiceStatus>,
    cycle: Mutex<Option<Cycle>>,
}

impl Inner {
    pub(crate) fn new(
        cfg: ServiceConfig,
        reconnect: ReconnectSupervisor,
        session: Option<SessionMonitor>,
        runner: PayloadRunner,
        watchdog: WatchdogRef,
        subscribers: Vec<Arc<dyn Subscribe>>,
        bus: Bus,
    ) -> Self {
        let (status, _rx) = watch::channel(ServiceStatus::default());
        Self {
            name: cfg.name.as_str().into(),
            restart: cfg.restart_policy(),
            cfg,
            reconnect,
            session,
            runner,
            watchdog,
            subscribers,
            bus,
            status,
            cycle: Mutex::new(None),
        }
    }
}

/// One start/stop cycle as seen from the handle.
struct Cycle {
    closing: CancellationToken,
    done: watch::Receiver<Outcome>,
}

/// Supervised network client.
///
/// Cheap to clone; clones control the same service.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use linkvisor::{EndpointConfig, Link, PayloadError, PayloadFn, Service, ServiceConfig};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut cfg = ServiceConfig::new(EndpointConfig::new("127.0.0.1", 9000));
///     cfg.max_retries = 5;
///
///     let service = Service::builder(cfg)
///         .payload(PayloadFn::arc("reader", |link: Link, ctx: CancellationToken| async move {
///             let conn = link.connection();
///             loop {
///                 tokio::select! {
///                     _ = ctx.cancelled() => return Ok(()),
///                     frame = conn.recv() => if frame.is_none() {
///                         return Err(PayloadError::fail("connection gone"));
///                     },
///                 }
///             }
///         }))
///         .build();
///
///     service.start().await?;
///     tokio::time::sleep(Duration::from_secs(30)).await;
///     service.stop().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl Service {
    /// Starts building a service.
    pub fn builder(cfg: ServiceConfig) -> ServiceBuilder {
        ServiceBuilder::new(cfg)
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The service name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    /// Starts a run on the current tokio runtime.
    ///
    /// Resolves once setup finished: `Ok(())` when the service is running,
    /// `Err(SetupFailed(..))` when setup failed (teardown continues in the
    /// background, see [`wait`](Self::wait)), or `Err(Cancelled)` when a stop
    /// arrived during setup.
    ///
    /// Fails with [`ServiceError::AlreadyStarted`] while a previous run is still
    /// in progress.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let (setup_tx, setup_rx) = oneshot::channel();
        {
            let mut cycle = self.lock_cycle();
            if let Some(current) = cycle.as_ref() {
                if current.done.borrow().is_none() {
                    return Err(ServiceError::AlreadyStarted);
                }
            }

            let closing = CancellationToken::new();
            let (done_tx, done_rx) = watch::channel(None);
            *cycle = Some(Cycle {
                closing: closing.clone(),
                done: done_rx,
            });
            let lifecycle = Lifecycle::new(Arc::clone(&self.inner), closing, setup_tx, done_tx);
            tokio::spawn(lifecycle.run());
        }

        setup_rx.await.unwrap_or_else(|_| {
            Err(ServiceError::Runtime {
                reason: "lifecycle task ended before reporting setup".to_string(),
            })
        })
    }

    /// Waits until the current run is over and returns its outcome.
    ///
    /// Returns `Ok(())` immediately if the service was never started.
    pub async fn wait(&self) -> Result<(), ServiceError> {
        match self.current_done() {
            Some(done) => wait_done(done).await,
            None => Ok(()),
        }
    }

    /// Stops the current run and waits for teardown to finish.
    ///
    /// Idempotent: later calls (and concurrent ones) wait for the same
    /// teardown and return the same outcome. A no-op on a service that was
    /// never started.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.request_stop();
        self.wait().await
    }

    /// Requests a stop without waiting for it.
    pub fn request_stop(&self) {
        let closing = {
            let cycle = self.lock_cycle();
            match cycle.as_ref() {
                Some(c) if c.done.borrow().is_none() => c.closing.clone(),
                _ => return,
            }
        };
        if !closing.is_cancelled() {
            self.inner.bus.publish(
                Event::new(EventKind::StopRequested)
                    .with_service(self.inner.name.clone())
                    .with_reason("stop requested"),
            );
            closing.cancel();
        }
    }

    /// Runs the service on a dedicated current-thread runtime, blocking until it is stopped.
    ///
    /// Fails with [`ServiceError::Runtime`] when called from within a tokio
    /// runtime. Stop it from another thread with
    /// [`request_stop`](Self::request_stop), or with a watchdog.
    pub fn run_blocking(&self) -> Result<(), ServiceError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ServiceError::Runtime {
                reason: "run_blocking called from within a tokio runtime".to_string(),
            });
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Runtime {
                reason: e.to_string(),
            })?;

        rt.block_on(async {
            match self.start().await {
                Err(ServiceError::AlreadyStarted) => Err(ServiceError::AlreadyStarted),
                _ => self.wait().await,
            }
        })
    }

    /// Current status snapshot.
    pub fn status(&self) -> ServiceStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<ServiceStatus> {
        self.inner.status.subscribe()
    }

    /// Raw event stream (every event published from now on).
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    fn current_done(&self) -> Option<watch::Receiver<Outcome>> {
        self.lock_cycle().as_ref().map(|c| c.done.clone())
    }

    fn lock_cycle(&self) -> MutexGuard<'_, Option<Cycle>> {
        self.inner
            .cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn wait_done(mut done: watch::Receiver<Outcome>) -> Result<(), ServiceError> {
    match done.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone().unwrap_or(Ok(())),
        Err(_) => Err(ServiceError::Runtime {
            reason: "lifecycle task ended without an outcome".to_string(),
        }),
    }
}
