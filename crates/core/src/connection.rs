use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ConnectionConfig, ResolvedUris};
use crate::error::{CameraError, Result};
use crate::redact::{mask_sensitive, mask_uri};
use crate::session::{
    DEFAULT_CONNECT_TIMEOUT, ManagerConfig, StatusChannel, StreamManager, StreamSessionConfig,
};
use crate::transport::{FrameSource, TransportFactory};
use crate::validation::{self, ValidationResult};

/// Session name of the high-quality stream (template #1).
pub const HIGH_STREAM: &str = "High";
/// Session name of the low-quality stream (template #2).
pub const LOW_STREAM: &str = "Low";

/// Single entry point for connecting to a dual-stream camera.
///
/// Validates and resolves the operator's config, then starts the `High` and
/// `Low` sessions through its [`StreamManager`]. Either both sessions are
/// started or neither is left running.
#[derive(Debug, Clone)]
pub struct ConnectionService {
    manager: StreamManager,
    connect_timeout: Duration,
}

impl ConnectionService {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_manager(StreamManager::new(factory))
    }

    pub fn with_config(factory: Arc<dyn TransportFactory>, config: ManagerConfig) -> Self {
        Self::with_manager(StreamManager::with_config(factory, config))
    }

    pub fn with_manager(manager: StreamManager) -> Self {
        Self {
            manager,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound on each session's transport connect step.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate `config` without touching any session.
    pub fn validate_config(
        &self,
        config: &ConnectionConfig,
    ) -> (Option<ResolvedUris>, ValidationResult) {
        validation::validate_and_resolve(config)
    }

    /// Start both streams and return their frame sources as `(high, low)`.
    ///
    /// Invalid configs fail with [`CameraError::Validation`] before any
    /// session starts. If `Low` cannot be started, `High` is stopped before
    /// the error is returned.
    pub fn connect(
        &self,
        parent: &CancellationToken,
        config: &ConnectionConfig,
    ) -> Result<(FrameSource, FrameSource)> {
        let (resolved, result) = self.validate_config(config);
        for warning in result.warnings() {
            tracing::warn!(warning = %mask_sensitive(warning), "connection config warning");
        }

        let Some(resolved) = resolved else {
            let message = result.error_message();
            tracing::warn!(errors = result.errors().len(), "connection config rejected");
            return Err(CameraError::Validation {
                message,
                errors: result.into_errors(),
            });
        };

        tracing::info!(
            high = %mask_uri(&resolved.uri1),
            low = %mask_uri(&resolved.uri2),
            "connecting to camera"
        );

        let high = self.session(HIGH_STREAM, resolved.uri1, config);
        let low = self.session(LOW_STREAM, resolved.uri2, config);

        let high_frames = self.manager.start_stream(parent, high)?;
        let low_frames = match self.manager.start_stream(parent, low) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(
                    error = %e.user_message(),
                    "low stream failed to start, stopping high stream"
                );
                // NotFound here means High already terminated on its own.
                let _ = self.manager.stop_stream(HIGH_STREAM);
                return Err(e);
            }
        };

        Ok((high_frames, low_frames))
    }

    /// Stop every running stream. Does not wait for teardown.
    pub fn disconnect(&self) {
        tracing::info!(streams = self.manager.len(), "disconnecting from camera");
        self.manager.stop_all_streams();
    }

    pub fn status_channel(&self) -> StatusChannel {
        self.manager.status_channel()
    }

    pub fn manager(&self) -> &StreamManager {
        &self.manager
    }

    fn session(&self, name: &str, uri: String, config: &ConnectionConfig) -> StreamSessionConfig {
        StreamSessionConfig::new(name, uri, config.login.as_str(), config.password.as_str())
            .with_timeout(self.connect_timeout)
    }
}
