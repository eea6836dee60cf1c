//! Transport layer: one bounded connection attempt and the handle it yields.
//!
//! ## Contents
//! - [`Signal`] set-once, multi-waiter notification ("closed", "joined")
//! - [`ConnectionHandle`] the caller's side of an open transport
//! - [`TransportEnd`] the implementation's side (frames, close request, closed notifier)
//! - [`Connector`] trait, [`ConnectorFn`] closure adapter, [`connect_bounded`]
//! - [`TcpConnector`] tokio TCP (optionally TLS) implementation
//!
//! ```text
//!            ConnectionHandle                         TransportEnd
//!   send(frame) ──────── outbound mpsc ───────────► outbound.recv() ─► socket
//!   recv()      ◄─────── inbound mpsc  ──────────── inbound.send()  ◄─ socket
//!   close()     ──────── close_requested token ───► pump exits, socket dropped
//!   closed()    ◄─────── Signal ─────────────────── ClosedNotifier (notify / drop)
//! ```
//!
//! The connector knows nothing about retries or handshakes.

mod connector;
mod handle;
mod signal;
mod tcp;

pub use connector::{Connector, ConnectorFn, ConnectorRef, connect_bounded};
pub use handle::{ClosedNotifier, ConnectionHandle, TransportEnd};
pub use signal::Signal;
pub use tcp::TcpConnector;
