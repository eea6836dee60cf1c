//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** every component
//! receives in its constructor and publishes to.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the lifecycle supervisor, `ReconnectSupervisor`,
//!   `SessionMonitor`, `payload::run_once`, `SubscriberSet` workers.
//! - **Consumers**: the per-run listener that fans out to the `SubscriberSet`
//!   (and thus `LogWriter`), plus any receiver from `Service::subscribe_events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
