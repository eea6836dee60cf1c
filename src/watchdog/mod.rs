//! # Watchdog: the external reason to stop.
//!
//! A [`Watchdog`] runs independently of the connection and the payload for the
//! whole life of a run. When it completes with anything but
//! [`WatchdogExit::Released`], the service tears down. Payload failures and
//! connection losses never stop the service by themselves; the watchdog (or an
//! explicit `stop()`) does.
//!
//! ## Implementations
//! - [`StopOnly`] never fires on its own; only `stop()` ends the service (default)
//! - [`SignalWatchdog`] fires on `SIGINT`/`SIGTERM`/`SIGQUIT` (Ctrl-C on Windows)
//! - [`WatchdogFn`] closure adapter for liveness checks and custom triggers
//!
//! The token passed to [`Watchdog::wait`] is cancelled during teardown; an
//! implementation then returns [`WatchdogExit::Released`].

mod signal;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use signal::SignalWatchdog;

/// Why a watchdog completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchdogExit {
    /// An OS signal arrived (signal name).
    Signal(&'static str),
    /// A custom condition fired (liveness check, deadline, ...).
    Tripped(String),
    /// The service released the watchdog during teardown.
    Released,
}

impl WatchdogExit {
    /// True unless the watchdog was merely released.
    pub fn fired(&self) -> bool {
        !matches!(self, WatchdogExit::Released)
    }

    /// Human-readable reason for events.
    pub fn reason(&self) -> String {
        match self {
            WatchdogExit::Signal(name) => format!("signal {name}"),
            WatchdogExit::Tripped(reason) => reason.clone(),
            WatchdogExit::Released => "released".to_string(),
        }
    }
}

/// Independently scheduled stop trigger.
#[async_trait]
pub trait Watchdog: Send + Sync + 'static {
    /// Waits until the watchdog fires or `ctx` is cancelled.
    async fn wait(&self, ctx: CancellationToken) -> WatchdogExit;

    /// Short watchdog name for logs.
    fn name(&self) -> &'static str {
        "watchdog"
    }
}

/// Shared handle to a watchdog.
pub type WatchdogRef = Arc<dyn Watchdog>;

/// Never fires; only releases.
#[derive(Clone, Copy, Debug, Default)]
pub struct StopOnly;

#[async_trait]
impl Watchdog for StopOnly {
    async fn wait(&self, ctx: CancellationToken) -> WatchdogExit {
        ctx.cancelled().await;
        WatchdogExit::Released
    }

    fn name(&self) -> &'static str {
        "stop_only"
    }
}

/// Closure-backed watchdog.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use linkvisor::{WatchdogExit, WatchdogFn, WatchdogRef};
///
/// // Stops the service after one hour.
/// let deadline: WatchdogRef = WatchdogFn::arc(|ctx: CancellationToken| async move {
///     tokio::select! {
///         _ = ctx.cancelled() => WatchdogExit::Released,
///         _ = tokio::time::sleep(Duration::from_secs(3600)) => WatchdogExit::Tripped("deadline".into()),
///     }
/// });
/// ```
#[derive(Debug)]
pub struct WatchdogFn<F> {
    f: F,
}

impl<F> WatchdogFn<F> {
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
impl<F, Fut> Watchdog for WatchdogFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WatchdogExit> + Send + 'static,
{
    async fn wait(&self, ctx: CancellationToken) -> WatchdogExit {
        (self.f)(ctx).await
    }

    fn name(&self) -> &'static str {
        "watchdog_fn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_only_releases_on_cancel() {
        let ctx = CancellationToken::new();
        ctx.cancel();
        let exit = StopOnly.wait(ctx).await;
        assert_eq!(exit, WatchdogExit::Released);
        assert!(!exit.fired());
    }

    #[test]
    fn reasons() {
        assert_eq!(WatchdogExit::Signal("SIGTERM").reason(), "signal SIGTERM");
        assert!(WatchdogExit::Tripped("stale".into()).fired());
    }
}
