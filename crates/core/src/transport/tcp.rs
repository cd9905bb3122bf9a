//! TCP reachability transport.
//!
//! Opens a plain TCP connection to the host and port of the stream URI
//! (port 554 when the URI has none) and forwards whatever bytes the peer
//! sends as opaque frames. It speaks no RTSP: a camera that waits for a
//! request simply keeps the session in `Playing` until it is stopped. The
//! peer closing the connection is a delivery failure.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Frame, FrameSink, StreamTransport, TransportFactory};
use crate::error::TransportError;
use crate::session::StreamSessionConfig;

/// Default RTSP port (RFC 2326 §3.2).
pub const DEFAULT_RTSP_PORT: u16 = 554;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Extract `(host, port)` from an RTSP URI.
pub fn host_and_port(uri: &str) -> Result<(String, u16), TransportError> {
    let parsed = Url::parse(uri.trim())?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or("URI has no host")?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), parsed.port().unwrap_or(DEFAULT_RTSP_PORT)))
}

/// [`StreamTransport`] that only holds a TCP connection open.
#[derive(Debug, Default)]
pub struct TcpProbeTransport {
    stream: Option<TcpStream>,
}

impl TcpProbeTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamTransport for TcpProbeTransport {
    async fn connect(
        &mut self,
        _cancel: &CancellationToken,
        config: &StreamSessionConfig,
    ) -> Result<(), TransportError> {
        let (host, port) = host_and_port(&config.uri)?;
        let stream = TcpStream::connect((host.as_str(), port)).await?;
        tracing::debug!(stream = %config.name, peer = ?stream.peer_addr().ok(), "tcp connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn start_delivery(
        &mut self,
        cancel: &CancellationToken,
        sink: FrameSink,
    ) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or("not connected")?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                read = stream.read(&mut buf) => read?,
            };
            if n == 0 {
                return Err("connection closed by peer".into());
            }
            sink.push(Frame::new(buf[..n].to_vec()));
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the stream closes the socket.
        self.stream.take();
        Ok(())
    }
}

/// Creates a [`TcpProbeTransport`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbeFactory;

impl TransportFactory for TcpProbeFactory {
    fn create(
        &self,
        _config: &StreamSessionConfig,
    ) -> Result<Box<dyn StreamTransport>, TransportError> {
        Ok(Box::new(TcpProbeTransport::new()))
    }
}
