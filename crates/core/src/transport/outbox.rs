//! Bounded frame queue between a transport and the consumer.
//!
//! The producer side ([`FrameSink`]) never waits: when the queue is full the
//! new frame is dropped and counted. A slow consumer loses frames instead of
//! stalling the network read path.
//!
//! The session task closes the outbox when it tears down. Closing drops the
//! only sender, even if the transport still holds sink clones on its own
//! tasks, so the consumer observes end-of-stream deterministically after
//! draining what was already queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::Frame;

struct SinkState {
    tx: Option<mpsc::Sender<Frame>>,
    last_frame_at: Option<Instant>,
    width: Option<u32>,
    height: Option<u32>,
}

struct Shared {
    state: Mutex<SinkState>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Counters and last-frame metadata of one outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub delivered: u64,
    pub dropped: u64,
    pub last_frame_at: Option<Instant>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Producer handle given to a transport. Cheap to clone.
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<Shared>,
}

/// Consumer end of a session's frames.
///
/// Yields `None` once the session has torn down and the queue is drained.
pub struct FrameSource {
    rx: mpsc::Receiver<Frame>,
}

/// Create an outbox holding at most `capacity` undelivered frames.
pub(crate) fn outbox(capacity: usize) -> (FrameSink, FrameSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared {
        state: Mutex::new(SinkState {
            tx: Some(tx),
            last_frame_at: None,
            width: None,
            height: None,
        }),
        delivered: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    (FrameSink { shared }, FrameSource { rx })
}

impl FrameSink {
    /// Offer a frame without waiting.
    ///
    /// Returns `false` when the frame was dropped: the queue was full, the
    /// consumer went away, or the session already closed the outbox.
    pub fn push(&self, frame: Frame) -> bool {
        let mut state = self.shared.state.lock();
        let Some(tx) = state.tx.as_ref() else {
            return false;
        };

        let (captured_at, width, height) = (frame.captured_at, frame.width, frame.height);
        match tx.try_send(frame) {
            Ok(()) => {
                state.last_frame_at = Some(captured_at);
                if width.is_some() {
                    state.width = width;
                    state.height = height;
                }
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Whether the outbox has been closed by its session.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().tx.is_none()
    }

    pub fn stats(&self) -> OutboxStats {
        let state = self.shared.state.lock();
        OutboxStats {
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            last_frame_at: state.last_frame_at,
            width: state.width,
            height: state.height,
        }
    }

    /// Drop the sender. Later pushes are refused.
    pub(crate) fn close(&self) {
        self.shared.state.lock().tx = None;
    }
}

impl FrameSource {
    /// Wait for the next frame; `None` means end-of-stream.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take a queued frame without waiting.
    ///
    /// `Ok(None)` means nothing is queued yet; `Err(())` means end-of-stream.
    #[allow(clippy::result_unit_err)]
    pub fn try_recv(&mut self) -> Result<Option<Frame>, ()> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(()),
        }
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
