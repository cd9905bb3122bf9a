pub mod config;
pub mod connection;
pub mod error;
pub mod redact;
pub mod session;
pub mod transport;
pub mod uri;
pub mod validation;

pub use config::{ConfigStore, ConnectionConfig, JsonConfigStore, ResolvedUris, SavedConfig};
pub use connection::{ConnectionService, HIGH_STREAM, LOW_STREAM};
pub use error::{CameraError, Result, TransportError};
pub use session::{
    ManagerConfig, StatusChannel, StreamInfo, StreamManager, StreamSessionConfig, StreamStatus,
    StreamStatusUpdate,
};
pub use transport::{Frame, FrameSink, FrameSource, StreamTransport, TransportFactory};
pub use validation::{FieldError, ValidationResult};
