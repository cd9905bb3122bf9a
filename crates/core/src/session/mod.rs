//! Stream session lifecycle management.
//!
//! A stream session is one named camera stream with its own background task.
//! The [`StreamManager`] owns the registry of running sessions and the
//! status channel they all report to.
//!
//! ## Session lifecycle
//!
//! ```text
//! start_stream          -> Connecting   (registered, emitted before return)
//! transport connected   -> Playing
//! connect/delivery fail -> Error        (task exits, no retry)
//! stop / parent cancel  -> Disconnected (transport closed, outbox closed)
//! ```
//!
//! ## Ownership
//!
//! - The registry lock guards only the name → entry map. Each entry holds
//!   the session id and its cancellation token together, so a name maps to
//!   both or to neither.
//! - Everything else about a session (transport, outbox, info) belongs to
//!   its task. Stop operations only cancel the token and never touch a
//!   session's transport or status.
//! - Network calls happen only inside session tasks, never under the lock.

pub mod status;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{CameraError, Result};
use crate::transport::{FrameSource, TransportFactory, outbox};
use crate::redact::mask_uri;
pub use status::{StatusChannel, StreamInfo, StreamStatus, StreamStatusUpdate};
use status::StatusSender;
use worker::SessionTask;

/// Default connect timeout per session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default per-session frame outbox capacity.
pub const DEFAULT_FRAME_CAPACITY: usize = 30;
/// Default capacity of the shared status channel.
pub const DEFAULT_STATUS_CAPACITY: usize = 100;

/// Parameters of one stream session.
#[derive(Clone)]
pub struct StreamSessionConfig {
    /// Session key, unique within a manager.
    pub name: String,
    pub uri: String,
    pub login: String,
    pub password: String,
    /// Upper bound on the transport connect step.
    pub timeout: Duration,
}

impl StreamSessionConfig {
    pub fn new(
        name: impl Into<String>,
        uri: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            login: login.into(),
            password: password.into(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The URI with every credential replaced by `***`. Safe to log.
    pub fn masked_uri(&self) -> String {
        mask_uri(&self.uri)
    }
}

impl fmt::Debug for StreamSessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSessionConfig")
            .field("name", &self.name)
            .field("uri", &self.masked_uri())
            .field("login", &self.login)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Channel sizing for a [`StreamManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Frames buffered per session before new ones are dropped.
    pub frame_capacity: usize,
    /// Status updates buffered before new ones are dropped.
    pub status_capacity: usize,
}

impl ManagerConfig {
    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    pub fn status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            status_capacity: DEFAULT_STATUS_CAPACITY,
        }
    }
}

struct SessionEntry {
    id: u64,
    cancel: CancellationToken,
    masked_uri: String,
    started_at: Instant,
}

/// A registered session as seen from outside its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: u64,
    pub name: String,
    pub masked_uri: String,
    pub started_at: Instant,
}

pub(crate) struct ManagerInner {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    next_id: AtomicU64,
    status_tx: StatusSender,
    status_rx: StatusChannel,
    factory: Arc<dyn TransportFactory>,
    config: ManagerConfig,
    tracker: TaskTracker,
}

impl ManagerInner {
    /// Remove `name` if it is still registered to session `id`.
    pub(crate) fn deregister(&self, name: &str, id: u64) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.get(name).is_some_and(|entry| entry.id == id) {
            sessions.remove(name);
            tracing::debug!(stream = %name, session_id = id, remaining = sessions.len(), "session deregistered");
            true
        } else {
            false
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        for (_, entry) in self.sessions.get_mut().drain() {
            entry.cancel.cancel();
        }
    }
}

/// Registry of concurrently running stream sessions.
///
/// Cheap to clone; clones share one registry and one status channel.
/// Dropping the last clone cancels every session still registered.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

impl StreamManager {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_config(factory, ManagerConfig::default())
    }

    pub fn with_config(factory: Arc<dyn TransportFactory>, config: ManagerConfig) -> Self {
        let (status_tx, status_rx) = status::status_channel(config.status_capacity);
        Self {
            inner: Arc::new(ManagerInner {
                sessions: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                status_tx,
                status_rx,
                factory,
                config,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Start a session and return its frame source.
    ///
    /// The session is registered and its `Connecting` update is emitted
    /// before this returns; connecting happens on the session's own task
    /// under a child token of `parent`. Fails with
    /// [`CameraError::SessionExists`] if `config.name` is already running,
    /// [`CameraError::NoRuntime`] outside a tokio runtime, or
    /// [`CameraError::Connection`] if the transport cannot be created.
    pub fn start_stream(
        &self,
        parent: &CancellationToken,
        config: StreamSessionConfig,
    ) -> Result<FrameSource> {
        let runtime = Handle::try_current().map_err(|_| CameraError::NoRuntime)?;

        let name = config.name.clone();
        let masked_uri = config.masked_uri();
        let cancel = parent.child_token();
        let id = {
            let mut sessions = self.inner.sessions.lock();
            if sessions.contains_key(&name) {
                tracing::warn!(stream = %name, "stream already running");
                return Err(CameraError::SessionExists(name));
            }
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            sessions.insert(
                name.clone(),
                SessionEntry {
                    id,
                    cancel: cancel.clone(),
                    masked_uri: masked_uri.clone(),
                    started_at: Instant::now(),
                },
            );
            id
        };

        // A start rejected above never creates a transport.
        let transport = match self.inner.factory.create(&config) {
            Ok(transport) => transport,
            Err(source) => {
                self.inner.deregister(&name, id);
                return Err(CameraError::Connection {
                    stream: name,
                    source,
                });
            }
        };

        tracing::info!(stream = %name, session_id = id, uri = %masked_uri, "starting stream");

        let (sink, source) = outbox::outbox(self.inner.config.frame_capacity);
        let task = SessionTask::new(
            id,
            config,
            transport,
            sink,
            cancel,
            self.inner.status_tx.clone(),
            Arc::downgrade(&self.inner),
        );
        task.announce();
        self.inner.tracker.spawn_on(task.run(), &runtime);

        Ok(source)
    }

    /// Cancel a session and remove it from the registry.
    ///
    /// Returns as soon as the session is cancelled; its task tears down on
    /// its own and reports `Disconnected`.
    pub fn stop_stream(&self, name: &str) -> Result<()> {
        let entry = self.inner.sessions.lock().remove(name);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!(stream = %name, session_id = entry.id, "stopping stream");
                Ok(())
            }
            None => {
                tracing::debug!(stream = %name, "stop for unknown stream");
                Err(CameraError::NotFound(name.to_string()))
            }
        }
    }

    /// Cancel every session and clear the registry. Does not wait.
    pub fn stop_all_streams(&self) {
        let drained: Vec<(String, SessionEntry)> = self.inner.sessions.lock().drain().collect();
        for (name, entry) in drained {
            entry.cancel.cancel();
            tracing::info!(stream = %name, session_id = entry.id, "stopping stream");
        }
    }

    /// Stop every session and wait up to `grace` for their tasks to finish
    /// tearing down. Returns `false` if the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.stop_all_streams();
        let tracker = &self.inner.tracker;
        tracker.close();
        let finished = tokio::time::timeout(grace, tracker.wait()).await.is_ok();
        tracker.reopen();
        if !finished {
            tracing::warn!(?grace, "stream tasks still running after shutdown grace period");
        }
        finished
    }

    /// The status channel shared by all sessions of this manager.
    pub fn status_channel(&self) -> StatusChannel {
        self.inner.status_rx.clone()
    }

    /// Status updates discarded because the status channel was full.
    pub fn dropped_status_updates(&self) -> u64 {
        self.inner.status_tx.dropped()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.sessions.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.lock().is_empty()
    }

    /// Registered sessions, sorted by name.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .inner
            .sessions
            .lock()
            .iter()
            .map(|(name, entry)| SessionSummary {
                id: entry.id,
                name: name.clone(),
                masked_uri: entry.masked_uri.clone(),
                started_at: entry.started_at,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Number of session tasks that have not finished tearing down.
    pub fn running_tasks(&self) -> usize {
        self.inner.tracker.len()
    }
}

impl fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamManager")
            .field("sessions", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
