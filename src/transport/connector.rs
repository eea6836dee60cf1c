//! # Connector: one bounded connection attempt.
//!
//! A [`Connector`] opens a transport to an [`EndpointConfig`] exactly once per
//! call. It does not retry and it does not perform any application handshake;
//! both belong to the supervisors above it.
//!
//! [`connect_bounded`] wraps an attempt with the endpoint's connect timeout,
//! so a connector implementation never has to enforce it itself.
//!
//! ## Example
//! ```rust
//! use linkvisor::{ConnectError, ConnectionHandle, ConnectorFn, ConnectorRef, EndpointConfig};
//!
//! let refuse: ConnectorRef = ConnectorFn::arc(|ep: EndpointConfig| async move {
//!     Err::<ConnectionHandle, _>(ConnectError::Refused { endpoint: ep.address() })
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EndpointConfig;
use crate::error::ConnectError;
use crate::transport::handle::ConnectionHandle;

/// Opens one transport connection.
///
/// Implementations must be cancel-safe: dropping the returned future abandons
/// the attempt and must not leak a half-open socket.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Makes a single attempt to connect to `endpoint`.
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle, ConnectError>;

    /// Short connector name for logs.
    fn name(&self) -> &'static str {
        "connector"
    }
}

/// Shared handle to a connector.
pub type ConnectorRef = Arc<dyn Connector>;

/// Closure-backed connector.
///
/// The closure receives an owned copy of the endpoint and creates a fresh
/// future per attempt.
#[derive(Debug)]
pub struct ConnectorFn<F> {
    f: F,
}

impl<F> ConnectorFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Connector for ConnectorFn<F>
where
    F: Fn(EndpointConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ConnectionHandle, ConnectError>> + Send + 'static,
{
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle, ConnectError> {
        (self.f)(endpoint.clone()).await
    }

    fn name(&self) -> &'static str {
        "connector_fn"
    }
}

/// Runs one attempt bounded by `endpoint.connect_timeout`.
///
/// An elapsed bound yields [`ConnectError::Timeout`]; the attempt's future is
/// dropped, which closes whatever it had opened.
pub async fn connect_bounded(
    connector: &dyn Connector,
    endpoint: &EndpointConfig,
) -> Result<ConnectionHandle, ConnectError> {
    match endpoint.connect_timeout() {
        None => connector.connect(endpoint).await,
        Some(limit) => match tokio::time::timeout(limit, connector.connect(endpoint)).await {
            Ok(res) => res,
            Err(_elapsed) => Err(ConnectError::Timeout {
                endpoint: endpoint.address(),
                timeout: limit,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let hang = ConnectorFn::new(|_ep: EndpointConfig| async {
            std::future::pending::<Result<ConnectionHandle, ConnectError>>().await
        });
        let ep = EndpointConfig::new("10.255.255.1", 9).with_connect_timeout(Duration::from_secs(2));

        let err = connect_bounded(&hang, &ep).await.unwrap_err();
        assert_eq!(
            err,
            ConnectError::Timeout {
                endpoint: "10.255.255.1:9".to_string(),
                timeout: Duration::from_secs(2),
            }
        );
    }

    #[tokio::test]
    async fn closure_receives_the_endpoint() {
        let c = ConnectorFn::new(|ep: EndpointConfig| async move {
            let (handle, _end) = ConnectionHandle::new(ep.address(), ep.use_tls, 1);
            Ok(handle)
        });
        let ep = EndpointConfig::new("example.org", 443).with_tls(true);

        let conn = connect_bounded(&c, &ep).await.unwrap();
        assert_eq!(conn.peer(), "example.org:443");
        assert!(conn.is_tls());
        // `_end` was dropped inside the closure.
        assert!(conn.is_closed());
    }
}
