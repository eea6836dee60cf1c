use std::time::Duration;

use linkvisor::{
    ConnectError, Connector, EndpointConfig, Link, PayloadError, PayloadFn, Service,
    ServiceConfig, ServiceError, ServiceState, TcpConnector, connect_bounded,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn listener() -> (TcpListener, EndpointConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, EndpointConfig::new("127.0.0.1", port))
}

/// Echo server that hangs up every client after `limit` bytes.
async fn echo_server(listener: TcpListener, limit: usize) {
    loop {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let mut seen = 0;
            while seen < limit {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        seen += n;
                        if socket.write_all(&buf[..n]).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }
}

#[tokio::test]
async fn loopback_frames_round_trip_and_close_reaches_the_peer() {
    let (listener, ep) = listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut got = [0u8; 4];
        socket.read_exact(&mut got).await.unwrap();
        socket.write_all(b"pong").await.unwrap();
        let mut rest = Vec::new();
        socket.read_to_end(&mut rest).await.unwrap();
        (got, rest.len())
    });

    let conn = TcpConnector::new().connect(&ep).await.unwrap();
    assert_eq!(conn.peer(), ep.address());
    assert!(!conn.is_tls());

    conn.send(b"ping".to_vec()).await.unwrap();
    assert_eq!(conn.recv().await.unwrap(), b"pong");

    conn.close();
    conn.wait_closed().await;
    let (got, rest) = server.await.unwrap();
    assert_eq!(&got, b"ping");
    assert_eq!(rest, 0);
}

#[tokio::test]
async fn closed_port_is_refused() {
    let (listener, ep) = listener().await;
    drop(listener);

    let err = connect_bounded(&TcpConnector::new(), &ep).await.unwrap_err();
    assert_eq!(
        err,
        ConnectError::Refused {
            endpoint: ep.address()
        }
    );
}

#[tokio::test]
async fn peer_hangup_sets_closed() {
    let (listener, ep) = listener().await;
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let conn = TcpConnector::new().connect(&ep).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), conn.wait_closed())
        .await
        .unwrap();
    assert_eq!(conn.recv().await, None);
}

#[tokio::test]
async fn service_reconnects_to_a_real_server() {
    let (listener, ep) = listener().await;
    tokio::spawn(echo_server(listener, 4));

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let mut cfg = ServiceConfig::new(ep);
    cfg.max_retries = 3;
    cfg.retry_delay = Duration::from_millis(20);
    cfg.restart_delay = Duration::from_millis(20);

    let svc = Service::builder(cfg)
        .payload(PayloadFn::arc("echo", move |link: Link, ctx: CancellationToken| {
            let seen = seen_tx.clone();
            async move {
                let conn = link.connection();
                conn.send(b"ping".to_vec())
                    .await
                    .map_err(|e| PayloadError::fail(e.to_string()))?;
                if let Some(frame) = conn.recv().await {
                    let _ = seen.send((conn.id(), frame));
                }
                ctx.cancelled().await;
                Ok::<(), PayloadError>(())
            }
        }))
        .without_log_writer()
        .build();

    svc.start().await.unwrap();
    let (first, frame) = seen_rx.recv().await.unwrap();
    assert_eq!(frame, b"ping");

    // the server hangs up after 4 bytes, so the next echo comes over a new connection
    let (second, frame) = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame, b"ping");
    assert_ne!(first, second);
    assert!(svc.status().reconnects >= 1);

    svc.stop().await.unwrap();
    assert_eq!(svc.status().state, ServiceState::Stopped);
}

#[tokio::test]
async fn service_without_a_server_exhausts_retries() {
    let (listener, ep) = listener().await;
    drop(listener);

    let mut cfg = ServiceConfig::new(ep);
    cfg.max_retries = 2;
    cfg.retry_delay = Duration::from_millis(10);
    let svc = Service::builder(cfg).without_log_writer().build();

    let err = svc.start().await.unwrap_err();
    assert!(matches!(
        err.root(),
        ServiceError::RetriesExhausted { attempts: 2, .. }
    ));
    assert_eq!(svc.wait().await, Err(err));
    assert_eq!(svc.status().state, ServiceState::Failed);
}
