//! # OS signal watchdog.
//!
//! **Unix:** `SIGINT` (Ctrl-C in a terminal), `SIGTERM` (systemd/Kubernetes
//! stop), `SIGQUIT`.
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`].
//!
//! If the listeners cannot be registered the watchdog logs a warning and only
//! waits for release; the service stays stoppable through `stop()`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Watchdog, WatchdogExit};

/// Fires on a process termination signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalWatchdog;

impl SignalWatchdog {
    /// Creates the watchdog. Listeners are registered per `wait` call.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Watchdog for SignalWatchdog {
    async fn wait(&self, ctx: CancellationToken) -> WatchdogExit {
        tokio::select! {
            _ = ctx.cancelled() => WatchdogExit::Released,
            res = wait_for_signal() => match res {
                Ok(name) => WatchdogExit::Signal(name),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for termination signals");
                    ctx.cancelled().await;
                    WatchdogExit::Released
                }
            },
        }
    }

    fn name(&self) -> &'static str {
        "signal"
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn releases_without_a_signal() {
        let ctx = CancellationToken::new();
        let child = ctx.clone();
        let waiter = tokio::spawn(async move { SignalWatchdog::new().wait(child).await });
        ctx.cancel();
        assert_eq!(waiter.await.unwrap(), WatchdogExit::Released);
    }
}
