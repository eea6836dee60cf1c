mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use common::{ScriptedConnector, Step, config, count, drain};
use linkvisor::{
    ConnectError, ConnectionHandle, EventKind, GreetingNegotiator, Link, NegotiatorFn,
    PayloadError, PayloadFn, Service, ServiceError, ServiceState, Signal,
};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn greeting_over_an_echo_transport_joins() {
    let connector = ScriptedConnector::always(Step::open());
    let svc = Service::builder(config(3, Duration::ZERO))
        .connector(connector.clone())
        .session(Arc::new(GreetingNegotiator::new(b"HELLO 1".to_vec(), b"HELLO".to_vec())))
        .payload(PayloadFn::arc("echo", |link: Link, ctx: CancellationToken| async move {
            let conn = link.connection();
            conn.send(b"after join".to_vec())
                .await
                .map_err(|e| PayloadError::fail(e.to_string()))?;
            let frame = conn.recv().await;
            if frame.as_deref() != Some(b"after join".as_slice()) {
                return Err(PayloadError::fatal("handshake reader swallowed payload traffic"));
            }
            ctx.cancelled().await;
            Ok::<(), PayloadError>(())
        }))
        .without_log_writer()
        .build();
    let mut events = svc.subscribe_events();

    svc.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(svc.status().state, ServiceState::Running);
    svc.stop().await.unwrap();

    let evs = drain(&mut events);
    assert_eq!(count(&evs, EventKind::SessionJoined), 1);
    assert_eq!(count(&evs, EventKind::PayloadFailed), 0);
    assert_eq!(connector.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn handshake_is_repeated_after_a_reconnect() {
    let connector = ScriptedConnector::new(
        [Step::open_for(Duration::from_secs(1)), Step::open()],
        Step::Refuse,
    );
    let svc = Service::builder(config(3, Duration::ZERO))
        .connector(connector.clone())
        .session(Arc::new(GreetingNegotiator::new(b"HI".to_vec(), b"HI".to_vec())))
        .without_log_writer()
        .build();
    let mut events = svc.subscribe_events();

    svc.start().await.unwrap();
    let mut rx = svc.subscribe_status();
    rx.wait_for(|s| s.reconnects == 1 && s.state == ServiceState::Running)
        .await
        .unwrap();
    svc.stop().await.unwrap();

    let evs = drain(&mut events);
    assert_eq!(count(&evs, EventKind::SessionJoined), 2);
    let joining = evs
        .iter()
        .filter(|e| e.kind == EventKind::StateChanged && e.state == Some(ServiceState::Joining))
        .count();
    assert_eq!(joining, 2);
}

#[tokio::test(start_paused = true)]
async fn negotiator_error_fails_setup_without_retrying() {
    let connector = ScriptedConnector::always(Step::open());
    let svc = Service::builder(config(5, Duration::ZERO))
        .connector(connector.clone())
        .session(NegotiatorFn::arc(|conn: ConnectionHandle| async move {
            Err::<Signal, _>(ServiceError::from(ConnectError::Transport {
                kind: std::io::ErrorKind::InvalidData,
                reason: format!("{} rejected the hello", conn.peer()),
            }))
        }))
        .without_log_writer()
        .build();

    let err = svc.start().await.unwrap_err();
    assert_eq!(err.as_label(), "setup_failed");
    assert_eq!(err.root().as_label(), "transport_error");
    assert_eq!(connector.attempts(), 1);
    assert_eq!(connector.close_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_the_handshake_is_a_clean_stop() {
    let connector = ScriptedConnector::always(Step::open());
    let mut cfg = config(3, Duration::ZERO);
    cfg.join_timeout = Duration::from_secs(3600);
    let svc = Service::builder(cfg)
        .connector(connector.clone())
        .session(NegotiatorFn::arc(|_conn: ConnectionHandle| async {
            Ok::<_, ServiceError>(Signal::new())
        }))
        .without_log_writer()
        .build();

    let starting = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.start().await })
    };
    let mut rx = svc.subscribe_status();
    rx.wait_for(|s| s.state == ServiceState::Joining).await.unwrap();

    assert_eq!(svc.stop().await, Ok(()));
    assert_eq!(starting.await.unwrap(), Err(ServiceError::Cancelled));
    assert_eq!(svc.status().state, ServiceState::Stopped);
    assert_eq!(connector.released(), 1);
}

/// Joins on every connection except the `skip`-th one.
fn joins_except(skip: u32) -> linkvisor::NegotiatorRef {
    let calls = Arc::new(AtomicU32::new(0));
    NegotiatorFn::arc(move |_conn: ConnectionHandle| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let joined = Signal::new();
            if call != skip {
                joined.set();
            }
            Ok::<_, ServiceError>(joined)
        }
    })
}

#[tokio::test(start_paused = true)]
async fn connection_lost_during_the_handshake_is_retried() {
    let connector = ScriptedConnector::new(
        [
            Step::open_for(Duration::from_secs(1)),
            Step::open_for(Duration::from_millis(100)),
            Step::open(),
        ],
        Step::Refuse,
    );
    let svc = Service::builder(config(0, Duration::from_millis(10)))
        .connector(connector.clone())
        .session(joins_except(2))
        .without_log_writer()
        .build();
    let mut events = svc.subscribe_events();

    svc.start().await.unwrap();
    let mut rx = svc.subscribe_status();
    rx.wait_for(|s| s.reconnects == 1 && s.state == ServiceState::Running)
        .await
        .unwrap();
    assert_eq!(connector.attempts(), 3);
    assert_eq!(svc.status().attempts, 0);

    svc.stop().await.unwrap();
    assert_eq!(svc.status().state, ServiceState::Stopped);

    let evs = drain(&mut events);
    assert_eq!(count(&evs, EventKind::SessionJoined), 2);
    assert_eq!(count(&evs, EventKind::SessionFailed), 1);
    assert_eq!(count(&evs, EventKind::BackoffScheduled), 1);
    assert_eq!(connector.released(), 3);
}

#[tokio::test(start_paused = true)]
async fn handshake_losses_count_against_max_retries() {
    let connector = ScriptedConnector::always(Step::open_for(Duration::from_millis(100)));
    let svc = Service::builder(config(2, Duration::from_millis(10)))
        .connector(connector.clone())
        .session(NegotiatorFn::arc(|_conn: ConnectionHandle| async {
            Ok::<_, ServiceError>(Signal::new())
        }))
        .without_log_writer()
        .build();

    let err = svc.start().await.unwrap_err();
    match err.root() {
        ServiceError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 2);
            assert_eq!(last.as_label(), "transport_error");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(connector.attempts(), 2);
    assert_eq!(svc.status().state, ServiceState::Failed);
}
