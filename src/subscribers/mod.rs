//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Components ── publish(Event) ──► Bus ──► run listener ──► SubscriberSet::emit(&Event)
//!                                                              │
//!                                               ┌──────────────┼──────────────┐
//!                                               ▼              ▼              ▼
//!                                          [queue S1]     [queue S2]     [queue SN]
//!                                               │              │              │
//!                                           LogWriter       Metrics        Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use async_trait::async_trait;
//! use linkvisor::{Event, EventKind, Subscribe};
//!
//! struct Reconnects;
//!
//! #[async_trait]
//! impl Subscribe for Reconnects {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ConnectionLost {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "reconnects"
//!     }
//! }
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
