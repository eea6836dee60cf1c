//! # Payload: the service's domain logic.
//!
//! A [`Payload`] runs over a [`Link`](crate::Link) once the service is
//! connected (and joined, if a session monitor is configured). It receives a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) that is cancelled
//! on stop and on connection loss, and should exit promptly when it is.
//!
//! - [`Payload`] trait; [`PayloadFn`] closure adapter; [`PayloadRef`] shared handle
//! - [`RunOutcome`] how one run ended
//! - [`PayloadRunner`] executes one run and reports it on the bus
//!
//! Whether a finished run is started again is decided by
//! [`RestartPolicy`](crate::RestartPolicy), not by the payload.

mod logic;
mod runner;

pub use logic::{Payload, PayloadFn, PayloadRef};
pub use runner::{PayloadRunner, RunOutcome};
