//! # Example: reconnecting_echo
//!
//! Keeps an echo client connected to a TCP endpoint. The endpoint comes from
//! the environment (`CONNECT_URL`, or `CONNECT_HOST`/`CONNECT_PORT`) and
//! defaults to `127.0.0.1:9000`.
//!
//! The payload sends a line every second and logs what comes back. Kill the
//! server and start it again to watch the service reconnect with backoff;
//! press Ctrl-C to stop.
//!
//! ## Flow
//! ```text
//! Service::start()
//!   ├─► ConnectAttempt → ConnectFailed → BackoffScheduled{250ms, 500ms, ...}
//!   ├─► Connected → Running → PayloadStarting
//!   │     └─► ping / echo every second
//!   ├─► server goes away → ConnectionLost → Reconnecting → ...
//!   └─► SIGINT → WatchdogFired → TeardownStarted → TransportClosed → Stopped
//! ```
//!
//! ## Run
//! ```bash
//! # terminal 1
//! ncat -lk 9000 --exec /bin/cat
//! # terminal 2
//! RUST_LOG=info,linkvisor=debug cargo run --example reconnecting_echo
//! ```

use std::sync::Arc;
use std::time::Duration;

use linkvisor::{
    BackoffPolicy, EndpointConfig, JitterPolicy, Link, PayloadError, PayloadFn, PayloadRef,
    Service, ServiceConfig, SignalWatchdog,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn echo_payload() -> PayloadRef {
    PayloadFn::arc("echo", |link: Link, ctx: CancellationToken| async move {
        let conn = link.connection();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        let mut n: u64 = 0;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tick.tick() => {
                    n += 1;
                    conn.send(format!("ping {n}\n").into_bytes())
                        .await
                        .map_err(|e| PayloadError::fail(e.to_string()))?;
                }
                frame = conn.recv() => match frame {
                    Some(bytes) => {
                        tracing::info!(peer = conn.peer(), echo = %String::from_utf8_lossy(&bytes).trim_end());
                    }
                    None => return Err(PayloadError::fail("connection closed")),
                },
            }
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Logging: RUST_LOG, default info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Configuration: defaults, then the environment
    let mut cfg = ServiceConfig::new(EndpointConfig::new("127.0.0.1", 9000)).apply_env()?;
    cfg.name = "echo-client".to_string();
    cfg.max_retries = 0;
    cfg.restart_delay = Duration::from_secs(1);

    // 3. Backoff between connection attempts
    let backoff = BackoffPolicy {
        first: Duration::from_millis(250),
        max: Duration::from_secs(10),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };

    // 4. Build: OS signals stop the service
    let service = Service::builder(cfg)
        .retry_policy(Arc::new(backoff))
        .payload(echo_payload())
        .watchdog(Arc::new(SignalWatchdog::new()))
        .build();

    // 5. Run until Ctrl-C
    service.start().await?;
    service.wait().await?;

    let status = service.status();
    tracing::info!(
        reconnects = status.reconnects,
        payload_runs = status.payload_runs,
        "done"
    );
    Ok(())
}
