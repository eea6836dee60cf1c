//! # TCP connector (optionally TLS).
//!
//! [`TcpConnector`] opens a tokio [`TcpStream`], optionally wraps it with
//! tokio-rustls (feature `tls`), and spawns a pump task that moves frames
//! between the socket and the [`ConnectionHandle`].
//!
//! The pump exits when the peer closes, an I/O error occurs, the service
//! requests a close, or every handle is dropped. It releases the socket first
//! and then sets the `closed` signal.
//!
//! Frames are raw byte chunks as read from the socket; message framing is the
//! payload's business.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::EndpointConfig;
use crate::error::ConnectError;
use crate::transport::connector::Connector;
use crate::transport::handle::{ConnectionHandle, TransportEnd};

/// Bound for the graceful write shutdown when a close is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Connector over tokio TCP.
#[derive(Clone)]
pub struct TcpConnector {
    nodelay: bool,
    frame_capacity: usize,
    read_buffer: usize,
    #[cfg(feature = "tls")]
    tls: Option<tokio_rustls::TlsConnector>,
}

impl fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("TcpConnector");
        d.field("nodelay", &self.nodelay)
            .field("frame_capacity", &self.frame_capacity)
            .field("read_buffer", &self.read_buffer);
        #[cfg(feature = "tls")]
        d.field("tls", &self.tls.is_some());
        d.finish()
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpConnector {
    /// Plain TCP with `TCP_NODELAY`, 64-frame queues and an 8 KiB read buffer.
    pub fn new() -> Self {
        Self {
            nodelay: true,
            frame_capacity: 64,
            read_buffer: 8 * 1024,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    /// Sets `TCP_NODELAY` on new sockets.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Bounds the inbound and outbound frame queues of each connection.
    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity.max(1);
        self
    }

    /// Size of the socket read buffer (upper bound of an inbound frame).
    pub fn with_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer = bytes.max(1);
        self
    }

    /// Enables TLS for endpoints with `use_tls = true`.
    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, config: std::sync::Arc<tokio_rustls::rustls::ClientConfig>) -> Self {
        self.tls = Some(tokio_rustls::TlsConnector::from(config));
        self
    }

    fn supports_tls(&self) -> bool {
        #[cfg(feature = "tls")]
        {
            self.tls.is_some()
        }
        #[cfg(not(feature = "tls"))]
        {
            false
        }
    }

    fn spawn_pump<S>(&self, stream: S, peer: String, tls: bool) -> ConnectionHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (handle, end) = ConnectionHandle::new(peer, tls, self.frame_capacity);
        tokio::spawn(pump(stream, end, self.read_buffer));
        handle
    }

    #[cfg(feature = "tls")]
    async fn open_tls(
        &self,
        stream: TcpStream,
        endpoint: &EndpointConfig,
        peer: String,
    ) -> Result<ConnectionHandle, ConnectError> {
        use tokio_rustls::rustls::pki_types::ServerName;

        let Some(tls) = &self.tls else {
            return Err(tls_unavailable());
        };
        let name = ServerName::try_from(endpoint.host.clone()).map_err(|e| {
            ConnectError::Transport {
                kind: io::ErrorKind::InvalidInput,
                reason: format!("invalid server name {:?}: {e}", endpoint.host),
            }
        })?;
        let stream = tls
            .connect(name, stream)
            .await
            .map_err(|e| ConnectError::transport(&e))?;
        Ok(self.spawn_pump(stream, peer, true))
    }

    #[cfg(not(feature = "tls"))]
    async fn open_tls(
        &self,
        _stream: TcpStream,
        _endpoint: &EndpointConfig,
        _peer: String,
    ) -> Result<ConnectionHandle, ConnectError> {
        Err(tls_unavailable())
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle, ConnectError> {
        if endpoint.use_tls && !self.supports_tls() {
            return Err(tls_unavailable());
        }

        let peer = endpoint.address();
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| ConnectError::from_io(&peer, &e))?;
        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
            }
        }

        if endpoint.use_tls {
            self.open_tls(stream, endpoint, peer).await
        } else {
            Ok(self.spawn_pump(stream, peer, false))
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

fn tls_unavailable() -> ConnectError {
    ConnectError::Transport {
        kind: io::ErrorKind::Unsupported,
        reason: "TLS requested but the connector has no TLS configuration".to_string(),
    }
}

/// Moves frames between `stream` and the handle until either side goes away.
async fn pump<S>(stream: S, end: TransportEnd, read_buffer: usize)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let TransportEnd {
        mut outbound,
        inbound,
        close_requested,
        closed,
    } = end;
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; read_buffer.max(1)];

    loop {
        tokio::select! {
            biased;

            _ = close_requested.cancelled() => {
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, writer.shutdown()).await;
                break;
            }

            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("peer closed the connection");
                    break;
                }
                Ok(n) => {
                    let delivered = tokio::select! {
                        biased;
                        _ = close_requested.cancelled() => false,
                        res = inbound.send(buf[..n].to_vec()) => res.is_ok(),
                    };
                    if !delivered {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "socket read failed");
                    break;
                }
            },

            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        tracing::debug!(error = %e, "socket write failed");
                        break;
                    }
                }
                // Every handle is gone.
                None => break,
            },
        }
    }

    drop(reader);
    drop(writer);
    drop(inbound);
    drop(outbound);
    closed.notify();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tls_without_configuration_is_rejected_before_connecting() {
        let ep = EndpointConfig::new("127.0.0.1", 1).with_tls(true);
        let err = TcpConnector::new().connect(&ep).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectError::Transport {
                kind: io::ErrorKind::Unsupported,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn pump_releases_on_peer_close() {
        let (client, server) = tokio::io::duplex(64);
        let (handle, end) = ConnectionHandle::new("duplex", false, 4);
        tokio::spawn(pump(client, end, 16));

        drop(server);
        handle.wait_closed().await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn pump_moves_frames_and_honours_close() {
        let (client, mut server) = tokio::io::duplex(64);
        let (handle, end) = ConnectionHandle::new("duplex", false, 4);
        tokio::spawn(pump(client, end, 16));

        handle.send(b"hello".to_vec()).await.unwrap();
        let mut got = [0u8; 5];
        server.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"hello");

        server.write_all(b"world").await.unwrap();
        assert_eq!(handle.recv().await.unwrap(), b"world");

        handle.close();
        handle.wait_closed().await;
        let mut rest = Vec::new();
        assert_eq!(server.read_to_end(&mut rest).await.unwrap(), 0);
    }
}
