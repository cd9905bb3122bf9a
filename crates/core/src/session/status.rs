//! Session status values and the shared status channel.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};

/// Lifecycle state of a stream session.
///
/// The core walks `Connecting -> Playing -> {Error | Disconnected}`, or
/// `Connecting -> {Error | Disconnected}` when connect fails or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    Disconnected,
    Connecting,
    Playing,
    Error,
    /// Reserved for a reconnect policy layered on top of the
    /// [`StreamManager`](super::StreamManager). The manager itself never
    /// assigns it.
    Reconnecting,
}

impl StreamStatus {
    /// Whether the session task has exited once this status is emitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Playing => "Playing",
            Self::Error => "Error",
            Self::Reconnecting => "Reconnecting...",
        };
        f.write_str(label)
    }
}

/// Snapshot of a session at the moment a status update was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub name: String,
    pub status: StreamStatus,
    /// Masked error text, set only with [`StreamStatus::Error`].
    pub error_message: Option<String>,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub last_frame_at: Option<Instant>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Maintained by a reconnect policy layer; always 0 from the core.
    pub reconnect_attempt: u32,
}

impl StreamInfo {
    pub fn new(name: impl Into<String>, status: StreamStatus) -> Self {
        Self {
            name: name.into(),
            status,
            error_message: None,
            frames_delivered: 0,
            frames_dropped: 0,
            last_frame_at: None,
            width: None,
            height: None,
            reconnect_attempt: 0,
        }
    }
}

/// One status transition of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatusUpdate {
    /// Distinguishes sessions that reused a name after a stop.
    pub session_id: u64,
    pub stream_name: String,
    pub status: StreamStatus,
    /// Masked error text for [`StreamStatus::Error`].
    pub error: Option<String>,
    pub info: StreamInfo,
}

/// Producer side of the shared status channel. Never waits.
#[derive(Clone)]
pub(crate) struct StatusSender {
    tx: mpsc::Sender<StreamStatusUpdate>,
    dropped: Arc<AtomicU64>,
}

impl StatusSender {
    /// Offer `update`; dropped and counted if the channel is full.
    pub(crate) fn emit(&self, update: StreamStatusUpdate) {
        if let Err(e) = self.tx.try_send(update) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let update = e.into_inner();
            tracing::debug!(
                stream = %update.stream_name,
                status = %update.status,
                dropped,
                "status channel full, update dropped"
            );
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side of the status channel shared by every session of one
/// manager.
///
/// Clones share one queue: each update is received by exactly one reader.
/// The channel stays open for as long as its manager exists.
#[derive(Clone)]
pub struct StatusChannel {
    rx: Arc<Mutex<mpsc::Receiver<StreamStatusUpdate>>>,
}

impl StatusChannel {
    /// Wait for the next update.
    pub async fn recv(&self) -> Option<StreamStatusUpdate> {
        self.rx.lock().await.recv().await
    }

    /// Take a queued update without waiting.
    pub fn try_recv(&self) -> Option<StreamStatusUpdate> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

pub(crate) fn status_channel(capacity: usize) -> (StatusSender, StatusChannel) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        StatusSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        StatusChannel {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}
