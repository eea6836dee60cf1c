//! Optional application-level handshake above an open transport.
//!
//! A transport being connected does not mean the remote side is ready: many
//! protocols require a "join" exchange first. This layer waits for it, bounded
//! by a timeout, without the connector or the reconnect supervisor knowing
//! anything about it.
//!
//! ## Contents
//! - [`Negotiator`] starts a handshake and returns its "joined" [`Signal`](crate::Signal)
//! - [`NegotiatorFn`] closure adapter
//! - [`GreetingNegotiator`] hello frame out, acknowledgment frame in
//! - [`SessionMonitor`] races "joined" against the join timeout and the connection closing
//! - [`SessionHandle`] connection plus its "joined" signal
//! - [`Link`] what a payload runs over: a bare connection or a joined session
//!
//! ```text
//! ConnectionHandle ──► SessionMonitor::join ──► Negotiator::begin ──► joined: Signal
//!                             │                                          │
//!                             ├── joined set ─────────────────► Ok(SessionHandle)
//!                             ├── join_timeout elapsed ───────► Err(SessionTimeout)
//!                             └── connection closed ──────────► Err(TransportError)
//! ```

mod link;
mod monitor;
mod negotiator;

pub use link::{Link, SessionHandle};
pub use monitor::SessionMonitor;
pub use negotiator::{GreetingNegotiator, Negotiator, NegotiatorFn, NegotiatorRef};
