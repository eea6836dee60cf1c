use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::core::reconnect::ReconnectSupervisor;
use crate::core::service::{Inner, Service};
use crate::error::PayloadError;
use crate::events::Bus;
use crate::payload::{PayloadFn, PayloadRef, PayloadRunner};
use crate::policies::{ConstantDelay, RetryRef};
use crate::session::{Link, NegotiatorRef, SessionMonitor};
use crate::subscribers::{LogWriter, Subscribe};
use crate::transport::{ConnectorRef, TcpConnector};
use crate::watchdog::{StopOnly, WatchdogRef};

/// Builder for a [`Service`].
///
/// Every collaborator has a default:
/// - connector: [`TcpConnector`]
/// - retry policy: [`ConstantDelay`] with `retry_delay`
/// - payload: idles until cancelled (keeps the connection supervised)
/// - watchdog: [`StopOnly`]
/// - no session handshake
/// - subscribers: [`LogWriter`]
pub struct ServiceBuilder {
    cfg: ServiceConfig,
    connector: Option<ConnectorRef>,
    retry: Option<RetryRef>,
    negotiator: Option<NegotiatorRef>,
    payload: Option<PayloadRef>,
    watchdog: Option<WatchdogRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    log_writer: bool,
}

impl ServiceBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: ServiceConfig) -> Self {
        Self {
            cfg,
            connector: None,
            retry: None,
            negotiator: None,
            payload: None,
            watchdog: None,
            subscribers: Vec::new(),
            log_writer: true,
        }
    }

    /// Sets the transport connector.
    pub fn connector(mut self, connector: ConnectorRef) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replaces the default constant-delay retry policy.
    ///
    /// The cap still comes from `ServiceConfig::max_retries`.
    pub fn retry_policy(mut self, retry: RetryRef) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Enables the session handshake, bounded by `ServiceConfig::join_timeout`.
    pub fn session(mut self, negotiator: NegotiatorRef) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    /// Sets the payload.
    pub fn payload(mut self, payload: PayloadRef) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the watchdog.
    pub fn watchdog(mut self, watchdog: WatchdogRef) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Adds an event subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Adds several event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Drops the default [`LogWriter`].
    pub fn without_log_writer(mut self) -> Self {
        self.log_writer = false;
        self
    }

    /// Builds the service. No task is spawned until [`Service::start`].
    pub fn build(self) -> Service {
        let cfg = self.cfg;
        let name = cfg.name.clone();
        let bus = Bus::new(cfg.bus_capacity_clamped());

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TcpConnector::new()) as ConnectorRef);
        let retry = self
            .retry
            .unwrap_or_else(|| Arc::new(ConstantDelay::new(cfg.retry_delay)) as RetryRef);
        let reconnect = ReconnectSupervisor::new(
            connector,
            retry,
            cfg.endpoint.clone(),
            bus.clone(),
            name.as_str(),
        );

        let session = self.negotiator.map(|negotiator| {
            SessionMonitor::new(negotiator, cfg.join_timeout, bus.clone(), name.as_str())
        });

        let payload = self.payload.unwrap_or_else(idle_payload);
        let runner = PayloadRunner::new(payload, bus.clone(), name.as_str());

        let watchdog = self
            .watchdog
            .unwrap_or_else(|| Arc::new(StopOnly) as WatchdogRef);

        let mut subscribers = self.subscribers;
        if self.log_writer {
            subscribers.push(Arc::new(LogWriter::new()));
        }

        Service::from_inner(Inner::new(
            cfg,
            reconnect,
            session,
            runner,
            watchdog,
            subscribers,
            bus,
        ))
    }
}

fn idle_payload() -> PayloadRef {
    PayloadFn::arc("idle", |_link: Link, ctx: CancellationToken| async move {
        ctx.cancelled().await;
        Ok::<(), PayloadError>(())
    })
}
