//! Connection parameters and their persisted form.
//!
//! [`ConnectionConfig`] is the operator's full input, password included. It
//! is never serialized. [`SavedConfig`] is the on-disk record: the same
//! fields minus the password, so a store never receives the secret.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default file name used by [`JsonConfigStore::in_current_dir`].
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Camera connection parameters entered by the operator.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Camera IPv4 address.
    pub ip: String,
    /// RTSP port, valid range 1–65535.
    pub port: u32,
    pub login: String,
    pub password: String,
    /// Template for the high-quality ("High") stream.
    pub rtsp_template_1: String,
    /// Template for the low-quality ("Low") stream.
    pub rtsp_template_2: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &"***")
            .field("rtsp_template_1", &self.rtsp_template_1)
            .field("rtsp_template_2", &self.rtsp_template_2)
            .finish()
    }
}

/// Both stream URIs after template substitution.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedUris {
    pub uri1: String,
    pub uri2: String,
    /// `uri1` with the password replaced by `***`, for display.
    pub uri1_masked: String,
    /// `uri2` with the password replaced by `***`, for display.
    pub uri2_masked: String,
    /// Whether both URIs canonicalize to the same stream.
    pub are_identical: bool,
}

impl fmt::Debug for ResolvedUris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedUris")
            .field("uri1", &self.uri1_masked)
            .field("uri2", &self.uri2_masked)
            .field("are_identical", &self.are_identical)
            .finish()
    }
}

/// Persisted connection record. Never carries the password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConfig {
    pub ip: String,
    pub port: u32,
    pub login: String,
    #[serde(rename = "rtsp_uri_1")]
    pub rtsp_template_1: String,
    #[serde(rename = "rtsp_uri_2")]
    pub rtsp_template_2: String,
}

impl SavedConfig {
    /// Rebuild the full connection config, supplying the password the
    /// record never stored.
    pub fn into_connection_config(self, password: impl Into<String>) -> ConnectionConfig {
        ConnectionConfig {
            ip: self.ip,
            port: self.port,
            login: self.login,
            password: password.into(),
            rtsp_template_1: self.rtsp_template_1,
            rtsp_template_2: self.rtsp_template_2,
        }
    }
}

impl From<&ConnectionConfig> for SavedConfig {
    fn from(config: &ConnectionConfig) -> Self {
        SavedConfig {
            ip: config.ip.clone(),
            port: config.port,
            login: config.login.clone(),
            rtsp_template_1: config.rtsp_template_1.clone(),
            rtsp_template_2: config.rtsp_template_2.clone(),
        }
    }
}

/// Load/save pair for the connection record.
pub trait ConfigStore {
    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<SavedConfig>>;

    /// Persist everything except the password.
    fn save(&self, config: &ConnectionConfig) -> Result<()>;
}

/// [`ConfigStore`] backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `config.json` in the process working directory.
    pub fn in_current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?.join(DEFAULT_CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Option<SavedConfig>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no saved config");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let saved: SavedConfig = serde_json::from_slice(&data).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to read config");
        })?;

        tracing::info!(path = %self.path.display(), "config loaded");
        Ok(Some(saved))
    }

    fn save(&self, config: &ConnectionConfig) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }

        let data = serde_json::to_vec_pretty(&SavedConfig::from(config))?;
        write_private(&self.path, &data).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to save config");
        })?;

        tracing::info!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)
}
