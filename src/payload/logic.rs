//! # Payload trait and function-backed payload (`PayloadFn`).
//!
//! [`PayloadFn`] wraps a closure `F: Fn(Link, CancellationToken) -> Fut`,
//! producing a fresh future per run. Nothing is shared between runs unless the
//! closure captures it explicitly (e.g. an `Arc<...>`).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use linkvisor::{Link, PayloadError, PayloadFn, PayloadRef};
//!
//! let echo: PayloadRef = PayloadFn::arc("echo", |link: Link, ctx: CancellationToken| async move {
//!     let conn = link.connection();
//!     loop {
//!         tokio::select! {
//!             _ = ctx.cancelled() => return Err(PayloadError::Canceled),
//!             frame = conn.recv() => match frame {
//!                 Some(frame) => conn.send(frame).await.map_err(|e| PayloadError::fail(e.to_string()))?,
//!                 None => return Err(PayloadError::fail("connection gone")),
//!             },
//!         }
//!     }
//! });
//! assert_eq!(echo.name(), "echo");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PayloadError;
use crate::session::Link;

/// Domain logic run by the service while connected.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use linkvisor::{Link, Payload, PayloadError};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Payload for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     async fn run(&self, link: Link, ctx: CancellationToken) -> Result<(), PayloadError> {
///         if ctx.is_cancelled() {
///             return Err(PayloadError::Canceled);
///         }
///         link.connection().send(b"ping".to_vec()).await.map_err(|e| PayloadError::fail(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Payload: Send + Sync + 'static {
    /// Stable, human-readable payload name.
    fn name(&self) -> &str;

    /// Runs until completion, failure or cancellation.
    ///
    /// Return `Err(PayloadError::Canceled)` (or `Ok(())`) after observing `ctx`
    /// cancelled; both count as a cancelled run.
    async fn run(&self, link: Link, ctx: CancellationToken) -> Result<(), PayloadError>;
}

/// Shared handle to a payload.
pub type PayloadRef = Arc<dyn Payload>;

/// Function-backed payload.
#[derive(Debug)]
pub struct PayloadFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> PayloadFn<F> {
    /// Creates a function-backed payload.
    ///
    /// Prefer [`PayloadFn::arc`] when you immediately need a [`PayloadRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the payload and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Payload for PayloadFn<F>
where
    F: Fn(Link, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PayloadError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, link: Link, ctx: CancellationToken) -> Result<(), PayloadError> {
        (self.f)(link, ctx).await
    }
}
