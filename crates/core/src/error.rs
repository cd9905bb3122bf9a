//! Error types for the camera stream library.

use crate::validation::FieldError;

/// Opaque failure reported by a [`StreamTransport`](crate::transport::StreamTransport).
///
/// The core never inspects transport-specific error codes; it only logs
/// (masked) and forwards these.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the camera stream library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Input**: [`Validation`](Self::Validation): user-correctable config
///   problems, with the ordered field list attached.
/// - **Network**: [`Connection`](Self::Connection): the transport failed to
///   establish or maintain a session.
/// - **Lifecycle**: [`NotFound`](Self::NotFound),
///   [`SessionExists`](Self::SessionExists),
///   [`NoRuntime`](Self::NoRuntime).
/// - **Normalization**: [`MalformedUri`](Self::MalformedUri): treated by
///   the validator as "uniqueness unproven", never as "equal".
/// - **Persistence**: [`Io`](Self::Io), [`Config`](Self::Config).
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// The connection config failed field-level or uniqueness checks.
    #[error("validation failed:\n{message}")]
    Validation {
        /// Ordered `field: message` lines, one per error.
        message: String,
        errors: Vec<FieldError>,
    },

    /// The transport could not start the named stream.
    #[error("stream {stream}: connection failed: {source}")]
    Connection {
        stream: String,
        #[source]
        source: TransportError,
    },

    /// No session with the given name is registered in the
    /// [`StreamManager`](crate::session::StreamManager).
    #[error("stream not found: {0}")]
    NotFound(String),

    /// A session with the given name is already registered.
    #[error("stream already running: {0}")]
    SessionExists(String),

    /// A URI could not be parsed for normalization. `uri` is password-masked.
    #[error("malformed URI {uri}: {reason}")]
    MalformedUri { uri: String, reason: String },

    /// Session tasks need a tokio runtime and none is active on this thread.
    #[error("no tokio runtime available to run the stream session")]
    NoRuntime,

    /// Underlying filesystem error while loading or saving configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted configuration could not be encoded or decoded.
    #[error("config format error: {0}")]
    Config(#[from] serde_json::Error),
}

impl CameraError {
    /// Text suitable for showing to an operator.
    ///
    /// Validation errors render as the full ordered field list; every other
    /// variant renders as a single line with its cause, passed through the
    /// log-boundary redaction policy.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            other => crate::redact::mask_sensitive(&other.to_string()).into_owned(),
        }
    }

    /// Whether this error is a user-correctable input problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Convenience alias for `Result<T, CameraError>`.
pub type Result<T> = std::result::Result<T, CameraError>;
