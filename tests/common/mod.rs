//! Shared fixtures: a scripted connector with an in-memory transport.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use linkvisor::{
    ConnectError, ConnectionHandle, Connector, EndpointConfig, Event, EventKind, ServiceConfig,
    TransportEnd,
};
use tokio::sync::broadcast;

/// What the next connection attempt does.
#[derive(Clone, Debug)]
pub enum Step {
    /// Fails with `ConnectError::Refused`.
    Refuse,
    /// Never completes (only a connect timeout or a stop ends it).
    Hang,
    /// Opens an echo transport; `drop_after` simulates the peer going away.
    Open { drop_after: Option<Duration> },
}

impl Step {
    pub fn open() -> Self {
        Step::Open { drop_after: None }
    }

    pub fn open_for(d: Duration) -> Self {
        Step::Open {
            drop_after: Some(d),
        }
    }
}

/// Connector replaying a script, then repeating `fallback`.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    attempts: AtomicU32,
    opened: AtomicU32,
    released: Arc<AtomicU32>,
    close_requests: Arc<AtomicU32>,
}

impl ScriptedConnector {
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            attempts: AtomicU32::new(0),
            opened: AtomicU32::new(0),
            released: Arc::new(AtomicU32::new(0)),
            close_requests: Arc::new(AtomicU32::new(0)),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new([], step)
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Transports opened so far.
    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Transports that have released their resources.
    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }

    /// Transports closed because the service asked for it.
    pub fn close_requests(&self) -> u32 {
        self.close_requests.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Refuse => Err(ConnectError::Refused {
                endpoint: endpoint.address(),
            }),
            Step::Hang => std::future::pending().await,
            Step::Open { drop_after } => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                let (conn, end) = ConnectionHandle::new(endpoint.address(), false, 16);
                tokio::spawn(echo_transport(
                    end,
                    drop_after,
                    self.released.clone(),
                    self.close_requests.clone(),
                ));
                Ok(conn)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

async fn echo_transport(
    end: TransportEnd,
    drop_after: Option<Duration>,
    released: Arc<AtomicU32>,
    close_requests: Arc<AtomicU32>,
) {
    let TransportEnd {
        mut outbound,
        inbound,
        close_requested,
        closed,
    } = end;
    let lifetime = tokio::time::sleep(drop_after.unwrap_or(Duration::MAX));
    tokio::pin!(lifetime);

    loop {
        tokio::select! {
            biased;
            _ = close_requested.cancelled() => {
                close_requests.fetch_add(1, Ordering::SeqCst);
                break;
            }
            _ = &mut lifetime, if drop_after.is_some() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if inbound.send(frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    drop(inbound);
    drop(outbound);
    released.fetch_add(1, Ordering::SeqCst);
    closed.notify();
}

/// Test configuration: fast delays, short teardown budget.
pub fn config(max_retries: u32, retry_delay: Duration) -> ServiceConfig {
    let mut cfg = ServiceConfig::new(EndpointConfig::new("127.0.0.1", 4000));
    cfg.name = "test".to_string();
    cfg.max_retries = max_retries;
    cfg.retry_delay = retry_delay;
    cfg.restart_delay = Duration::from_millis(100);
    cfg.join_timeout = Duration::from_secs(1);
    cfg.grace = Duration::from_millis(500);
    cfg.teardown_timeout = Duration::from_secs(2);
    cfg
}

/// Drains every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Number of events of `kind` in `events`.
pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}
