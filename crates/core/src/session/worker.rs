//! The background task that owns one stream session.

use std::sync::Weak;

use tokio_util::sync::CancellationToken;

use super::status::{StatusSender, StreamInfo, StreamStatus, StreamStatusUpdate};
use super::{ManagerInner, StreamSessionConfig};
use crate::error::TransportError;
use crate::redact::mask_sensitive;
use crate::transport::{FrameSink, StreamTransport};

/// Why the session task is exiting.
enum Exit {
    /// Cancelled by a stop call or the parent token.
    Cancelled,
    /// The transport failed to connect or to keep delivering.
    Failed(String),
}

/// Exclusive owner of a session's transport, outbox and info.
pub(super) struct SessionTask {
    id: u64,
    config: StreamSessionConfig,
    transport: Box<dyn StreamTransport>,
    sink: FrameSink,
    cancel: CancellationToken,
    status: StatusSender,
    manager: Weak<ManagerInner>,
    info: StreamInfo,
}

impl SessionTask {
    pub(super) fn new(
        id: u64,
        config: StreamSessionConfig,
        transport: Box<dyn StreamTransport>,
        sink: FrameSink,
        cancel: CancellationToken,
        status: StatusSender,
        manager: Weak<ManagerInner>,
    ) -> Self {
        let info = StreamInfo::new(config.name.clone(), StreamStatus::Connecting);
        Self {
            id,
            config,
            transport,
            sink,
            cancel,
            status,
            manager,
            info,
        }
    }

    /// Emit the initial `Connecting` update. Called before the task is
    /// spawned so it always precedes every later update of this session.
    pub(super) fn announce(&self) {
        self.status.emit(self.update(None));
    }

    pub(super) async fn run(mut self) {
        let exit = match self.connect().await {
            Err(exit) => exit,
            Ok(()) => {
                tracing::info!(stream = %self.config.name, session_id = self.id, "stream connected");
                self.set_status(StreamStatus::Playing, None);
                self.deliver().await
            }
        };
        self.finish(exit).await;
    }

    async fn connect(&mut self) -> Result<(), Exit> {
        let timeout = self.config.timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Exit::Cancelled),
            res = tokio::time::timeout(timeout, self.transport.connect(&self.cancel, &self.config)) => {
                match res {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(self.failed("connect failed", &e)),
                    Err(_) => {
                        let e: TransportError = format!("connect timed out after {timeout:?}").into();
                        Err(self.failed("connect failed", &e))
                    }
                }
            }
        }
    }

    async fn deliver(&mut self) -> Exit {
        let sink = self.sink.clone();
        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Exit::Cancelled,
            res = self.transport.start_delivery(&self.cancel, sink) => res,
        };

        match res {
            Err(e) => self.failed("delivery failed", &e),
            Ok(()) => {
                self.cancel.cancelled().await;
                Exit::Cancelled
            }
        }
    }

    fn failed(&self, what: &str, e: &TransportError) -> Exit {
        let message = mask_sensitive(&e.to_string()).into_owned();
        tracing::error!(
            stream = %self.config.name,
            session_id = self.id,
            uri = %self.config.masked_uri(),
            error = %message,
            "{what}"
        );
        Exit::Failed(message)
    }

    /// Release the transport, leave the registry, report the terminal
    /// status, then end the frame stream.
    async fn finish(mut self, exit: Exit) {
        // Stops anything the transport spawned under our token.
        self.cancel.cancel();

        if let Err(e) = self.transport.close().await {
            tracing::warn!(
                stream = %self.config.name,
                session_id = self.id,
                error = %mask_sensitive(&e.to_string()),
                "transport close failed"
            );
        }

        if let Some(manager) = self.manager.upgrade() {
            manager.deregister(&self.config.name, self.id);
        }

        match exit {
            Exit::Cancelled => {
                self.set_status(StreamStatus::Disconnected, None);
                tracing::info!(stream = %self.config.name, session_id = self.id, "stream disconnected");
            }
            Exit::Failed(message) => self.set_status(StreamStatus::Error, Some(message)),
        }

        self.sink.close();
    }

    fn set_status(&mut self, status: StreamStatus, error: Option<String>) {
        self.info.status = status;
        self.info.error_message = error.clone();
        self.status.emit(self.update(error));
    }

    fn update(&self, error: Option<String>) -> StreamStatusUpdate {
        let stats = self.sink.stats();
        let mut info = self.info.clone();
        info.frames_delivered = stats.delivered;
        info.frames_dropped = stats.dropped;
        info.last_frame_at = stats.last_frame_at;
        info.width = stats.width;
        info.height = stats.height;

        StreamStatusUpdate {
            session_id: self.id,
            stream_name: self.config.name.clone(),
            status: info.status,
            error,
            info,
        }
    }
}
