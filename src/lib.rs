//! # linkvisor
//!
//! **Linkvisor** supervises the lifecycle of a long-running network client:
//! it connects with bounded retries, optionally waits for a session
//! handshake, runs a payload over the connection, reconnects when the
//! transport drops, and tears everything down in a bounded, idempotent way.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ServiceConfig ─┐      ┌──────────── Service (handle) ────────────┐
//!   Connector ─────┤      │ start() / wait() / stop() / run_blocking │
//!   RetryPolicy ───┼──► ServiceBuilder ──► build()                    │
//!   Negotiator ────┤      └────────────────────┬─────────────────────┘
//!   Payload ───────┤                           │ spawns one per run
//!   Watchdog ──────┘                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Lifecycle task                                                   │
//! │  - ReconnectSupervisor (connect under RetryPolicy + RetryState)   │
//! │  - SessionMonitor      (handshake bounded by join_timeout)        │
//! │  - PayloadRunner       (run_once, restarts per RestartPolicy)     │
//! │  - Watchdog            (stop trigger: signals, custom checks)     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        │ ConnectAttempt   │ SessionJoined    │ PayloadStarting
//!        │ BackoffScheduled │ SessionFailed    │ PayloadFailed
//!        │ ConnectionLost   │ ...              │ StateChanged ...
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │              (capacity: ServiceConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │   subscriber listener  │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                    LogWriter    sub2       subN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ─► SettingUp ─► Connecting ─► [Joining] ─► Running
//!                         ▲                          │ transport dropped
//!                         └──── Reconnecting ◄───────┘
//!
//! stop() / watchdog / fatal error:
//!   any state ─► TearingDown ─► Stopped | Failed
//!     ├─ cancel the payload (grace, then abort)
//!     ├─ close the transport and wait until it is closed
//!     └─ release the watchdog
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Service**       | Start, stop and observe one supervised client.           | [`Service`], [`ServiceBuilder`]             |
//! | **Transport**     | Open connections; TCP built in, TLS behind `tls`.        | [`Connector`], [`TcpConnector`]             |
//! | **Retry**         | Bounded connection retries with delays or backoff.       | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Session**       | Optional handshake after connecting.                     | [`Negotiator`], [`SessionMonitor`]          |
//! | **Payload**       | The work done over the link, with restart rules.         | [`Payload`], [`PayloadFn`], [`RestartPolicy`] |
//! | **Watchdog**      | External stop triggers (OS signals, health checks).      | [`Watchdog`], [`SignalWatchdog`]            |
//! | **Events**        | Lifecycle events for logging and custom subscribers.     | [`Event`], [`Subscribe`], [`LogWriter`]     |
//! | **Errors**        | Typed errors with stable labels.                         | [`ServiceError`], [`ConnectError`]          |
//!
//! ## Optional features
//! - `tls`: enables TLS in [`TcpConnector`] through `tokio-rustls`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use linkvisor::{
//!     EndpointConfig, Link, PayloadError, PayloadFn, Service, ServiceConfig, SignalWatchdog,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ServiceConfig::new(EndpointConfig::new("127.0.0.1", 9000));
//!     cfg.max_retries = 3;
//!     cfg.retry_delay = Duration::from_secs(1);
//!
//!     let echo = PayloadFn::arc("echo", |link: Link, ctx: CancellationToken| async move {
//!         let conn = link.connection();
//!         loop {
//!             tokio::select! {
//!                 _ = ctx.cancelled() => return Ok(()),
//!                 frame = conn.recv() => match frame {
//!                     Some(bytes) => {
//!                         conn.send(bytes).await.map_err(|e| PayloadError::fail(e.to_string()))?
//!                     }
//!                     None => return Err(PayloadError::fail("connection closed")),
//!                 },
//!             }
//!         }
//!     });
//!
//!     let service = Service::builder(cfg)
//!         .payload(echo)
//!         .watchdog(Arc::new(SignalWatchdog::new()))
//!         .build();
//!
//!     service.start().await?;
//!     service.wait().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod payload;
mod policies;
mod session;
mod subscribers;
mod transport;
mod watchdog;

// ---- Public re-exports ----

pub use config::{ENV_HOST, ENV_PORT, ENV_SSL, ENV_URL, EndpointConfig, ServiceConfig};
pub use core::{
    ReconnectSupervisor, RetryState, Service, ServiceBuilder, ServiceState, ServiceStatus,
};
pub use error::{ConfigError, ConnectError, PayloadError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use payload::{Payload, PayloadFn, PayloadRef, PayloadRunner, RunOutcome};
pub use policies::{
    BackoffPolicy, ConstantDelay, JitterPolicy, RestartPolicy, RetryDecision, RetryPolicy,
    RetryRef,
};
pub use session::{
    GreetingNegotiator, Link, Negotiator, NegotiatorFn, NegotiatorRef, SessionHandle,
    SessionMonitor,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use transport::{
    ClosedNotifier, ConnectionHandle, Connector, ConnectorFn, ConnectorRef, Signal, TcpConnector,
    TransportEnd, connect_bounded,
};
pub use watchdog::{SignalWatchdog, StopOnly, Watchdog, WatchdogExit, WatchdogFn, WatchdogRef};
