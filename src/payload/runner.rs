//! # Run a single payload run.
//!
//! [`PayloadRunner::run_once`] executes one run of the payload with the token it
//! is given and publishes lifecycle events to the [`Bus`].
//!
//! ## Event flow
//! ```text
//! publish PayloadStarting
//!   payload.run() → Ok(())                    → CompletedNormally → PayloadCompleted
//!   payload.run() → Ok(()) after cancellation → Cancelled         → PayloadCancelled
//!   payload.run() → Err(Canceled)             → Cancelled         → PayloadCancelled
//!   payload.run() → Err(Fail/Fatal)           → Failed(e)         → PayloadFailed
//!   payload.run() panics                      → Failed(Fatal)     → PayloadFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event.
//! - A panic is contained and reported as a fatal failure, never restarted.

use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::PayloadError;
use crate::events::{Bus, Event, EventKind};
use crate::payload::logic::PayloadRef;
use crate::session::Link;

/// How one payload run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The payload returned on its own.
    CompletedNormally,
    /// The payload exited because its token was cancelled.
    Cancelled,
    /// The payload failed.
    Failed(PayloadError),
}

impl RunOutcome {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunOutcome::CompletedNormally => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed(_) => "failed",
        }
    }
}

/// Executes payload runs and reports them.
#[derive(Clone)]
pub struct PayloadRunner {
    payload: PayloadRef,
    bus: Bus,
    service: Arc<str>,
}

impl PayloadRunner {
    /// Creates a runner publishing to `bus` under the `service` name.
    pub fn new(payload: PayloadRef, bus: Bus, service: impl Into<Arc<str>>) -> Self {
        Self {
            payload,
            bus,
            service: service.into(),
        }
    }

    /// The payload's name.
    pub fn name(&self) -> &str {
        self.payload.name()
    }

    /// Runs the payload once over `link`; `run` is the 1-based run number.
    pub async fn run_once(&self, link: Link, ctx: CancellationToken, run: u32) -> RunOutcome {
        self.publish(Event::new(EventKind::PayloadStarting), run);

        let fut = self.payload.run(link, ctx.clone());
        let res = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(PayloadError::fatal(format!(
                "payload panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        let outcome = match res {
            Ok(()) if ctx.is_cancelled() => RunOutcome::Cancelled,
            Ok(()) => RunOutcome::CompletedNormally,
            Err(PayloadError::Canceled) => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Failed(e),
        };

        match &outcome {
            RunOutcome::CompletedNormally => {
                self.publish(Event::new(EventKind::PayloadCompleted), run);
            }
            RunOutcome::Cancelled => {
                self.publish(Event::new(EventKind::PayloadCancelled), run);
            }
            RunOutcome::Failed(e) => {
                self.publish(
                    Event::new(EventKind::PayloadFailed).with_reason(e.to_string()),
                    run,
                );
            }
        }
        outcome
    }

    fn publish(&self, ev: Event, run: u32) {
        self.bus
            .publish(ev.with_service(self.service.clone()).with_attempt(run));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
