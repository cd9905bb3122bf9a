//! The network side of a stream session, seen from the core.
//!
//! The wire-level work (RTSP handshake, RTP depacketization, decoding) lives
//! behind the [`StreamTransport`] capability. The core only drives it
//! through three calls and treats every failure as opaque:
//!
//! ```text
//! connect(cancel, config)      establish the session
//! start_delivery(cancel, sink) push frames into the sink until cancelled
//! close()                      release the handle
//! ```
//!
//! A [`TransportFactory`] creates one transport per session, so the
//! [`StreamManager`](crate::session::StreamManager) never shares a handle
//! between sessions.
//!
//! - [`outbox`]: the bounded, drop-on-full frame queue between a transport
//!   and the consumer.
//! - [`tcp`]: a reachability transport that only opens a TCP connection.

pub mod outbox;
pub mod tcp;

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::session::StreamSessionConfig;

pub use outbox::{FrameSink, FrameSource};
pub use tcp::{TcpProbeFactory, TcpProbeTransport};

/// One unit of media handed to the consumer. Opaque to the core.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub captured_at: Instant,
}

impl Frame {
    /// A frame with no known dimensions, stamped now.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            width: None,
            height: None,
            captured_at: Instant::now(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Connection to one camera stream.
///
/// Implementations must return promptly once `cancel` fires.
#[async_trait]
pub trait StreamTransport: Send {
    /// Establish the session described by `config`.
    async fn connect(
        &mut self,
        cancel: &CancellationToken,
        config: &StreamSessionConfig,
    ) -> Result<(), TransportError>;

    /// Push frames into `sink` until `cancel` fires or a fatal error occurs.
    ///
    /// May return `Ok(())` early if delivery continues on a task the
    /// transport owns; the session then waits for cancellation itself.
    async fn start_delivery(
        &mut self,
        cancel: &CancellationToken,
        sink: FrameSink,
    ) -> Result<(), TransportError>;

    /// Release the underlying handle. Called exactly once per session.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Creates a fresh [`StreamTransport`] for each session.
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &StreamSessionConfig) -> Result<Box<dyn StreamTransport>, TransportError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&StreamSessionConfig) -> Result<Box<dyn StreamTransport>, TransportError> + Send + Sync,
{
    fn create(&self, config: &StreamSessionConfig) -> Result<Box<dyn StreamTransport>, TransportError> {
        self(config)
    }
}
