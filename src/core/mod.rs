//! Runtime core: supervision and lifecycle.
//!
//! The public entry point is [`Service`], built with [`ServiceBuilder`].
//!
//! Internal modules:
//! - [`state`]: lifecycle states, retry bookkeeping, status snapshots;
//! - [`reconnect`]: one connection cycle under the retry policy;
//! - [`lifecycle`]: the task driving one run from setup to teardown;
//! - [`service`]: the handle (`start`/`wait`/`stop`/`run_blocking`);
//! - [`builder`]: wiring of connector, policies, session, payload and watchdog.

mod builder;
mod lifecycle;
mod reconnect;
mod service;
mod state;

pub use builder::ServiceBuilder;
pub use reconnect::ReconnectSupervisor;
pub use service::Service;
pub use state::{RetryState, ServiceState, ServiceStatus};
