//! Connection config validation.
//!
//! Validation runs in two phases:
//!
//! 1. **Syntax**: each field on its own (IPv4 address, port range,
//!    non-blank credentials, template shape).
//! 2. **Uniqueness**: only when phase 1 found nothing. Both templates are
//!    resolved with the real values and compared in canonical form. A
//!    detected duplicate is an error (fail closed); a URI that cannot be
//!    normalized only produces a warning (fail open).
//!
//! Problems accumulate in a [`ValidationResult`] instead of short-circuiting,
//! so the operator sees every field that needs fixing at once.

use std::fmt;
use std::net::Ipv4Addr;

use url::Url;

use crate::config::{ConnectionConfig, ResolvedUris};
use crate::redact::mask_sensitive;
use crate::uri::{normalize, template};

pub const FIELD_IP: &str = "IP";
pub const FIELD_PORT: &str = "Port";
pub const FIELD_LOGIN: &str = "Login";
pub const FIELD_PASSWORD: &str = "Password";
pub const FIELD_URI_1: &str = "RTSP URI #1";
pub const FIELD_URI_2: &str = "RTSP URI #2";
/// Key of the cross-field duplicate-stream error.
pub const FIELD_URIS: &str = "RTSP URIs";

/// Fixed values substituted into templates for the shape check, so a
/// template can be judged without the operator's real credentials.
const PROBE_LOGIN: &str = "user";
const PROBE_PASSWORD: &str = "pass";
const PROBE_IP: &str = "192.168.1.1";
const PROBE_PORT: &str = "554";

/// A single problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a [`ConnectionConfig`].
///
/// `valid` holds exactly when `errors` is empty; the only way to add an
/// error is [`add_error`](Self::add_error), which keeps the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<FieldError>,
    warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(FieldError::new(field, message));
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Errors in the order they were found.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether any error is keyed by `field`.
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `field: message` lines joined by newlines; empty when valid.
    pub fn error_message(&self) -> String {
        self.errors
            .iter()
            .map(FieldError::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `ip` is an IPv4 literal. IPv6 literals and hostnames are rejected.
pub fn is_valid_ipv4(ip: &str) -> bool {
    ip.trim().parse::<Ipv4Addr>().is_ok()
}

pub fn is_valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

/// Whether `uri` is an absolute `rtsp://` URI with a non-empty host.
pub fn is_valid_rtsp_uri(uri: &str) -> bool {
    let uri = uri.trim();
    if !has_rtsp_prefix(uri) {
        return false;
    }

    match Url::parse(uri) {
        Ok(parsed) => {
            parsed.scheme().eq_ignore_ascii_case("rtsp")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Shape check for a template: substitute the probe values, then require
/// a valid RTSP URI.
pub fn is_valid_rtsp_template(template_uri: &str) -> bool {
    let template_uri = template_uri.trim();
    if !has_rtsp_prefix(template_uri) {
        return false;
    }

    let probe = template::substitute(
        template_uri,
        PROBE_LOGIN,
        PROBE_PASSWORD,
        PROBE_IP,
        PROBE_PORT,
    );
    is_valid_rtsp_uri(&probe)
}

fn has_rtsp_prefix(uri: &str) -> bool {
    uri.get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("rtsp://"))
}

/// Run the syntax checks, then the uniqueness check if they all passed.
pub fn validate_connection_config(config: &ConnectionConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_valid_ipv4(&config.ip) {
        result.add_error(FIELD_IP, "not a valid IPv4 address");
    }

    if !is_valid_port(config.port) {
        result.add_error(FIELD_PORT, "port must be a number in 1-65535");
    }

    if config.login.trim().is_empty() {
        result.add_error(FIELD_LOGIN, "login must not be empty");
    }

    if config.password.trim().is_empty() {
        result.add_error(FIELD_PASSWORD, "password must not be empty");
    }

    if !is_valid_rtsp_template(&config.rtsp_template_1) {
        result.add_error(FIELD_URI_1, "must start with rtsp:// and be a valid URL");
    }

    if !is_valid_rtsp_template(&config.rtsp_template_2) {
        result.add_error(FIELD_URI_2, "must start with rtsp:// and be a valid URL");
    }

    if result.is_valid() {
        check_stream_uniqueness(config, &mut result);
    }

    result
}

fn check_stream_uniqueness(config: &ConnectionConfig, result: &mut ValidationResult) {
    let uri1 = template::resolve(&config.rtsp_template_1, config);
    let uri2 = template::resolve(&config.rtsp_template_2, config);

    match normalize::are_identical(&uri1, &uri2) {
        Ok(true) => result.add_error(
            FIELD_URIS,
            "both RTSP URIs point to the same stream after normalization; \
             change one of them to avoid pulling the stream twice",
        ),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %mask_sensitive(&e.to_string()), "cannot verify RTSP URI uniqueness");
            result.add_warning(format!("cannot verify uniqueness of RTSP URIs: {e}"));
        }
    }
}

/// Validate `config` and, when valid, resolve both stream URIs.
///
/// The resolved value is `None` whenever the result is invalid. When it is
/// `Some`, `are_identical` repeats the uniqueness verdict (always `false`
/// here, since a duplicate makes the config invalid; also `false` when
/// uniqueness could not be verified).
pub fn validate_and_resolve(config: &ConnectionConfig) -> (Option<ResolvedUris>, ValidationResult) {
    let result = validate_connection_config(config);
    if !result.is_valid() {
        return (None, result);
    }

    let mut resolved = template::resolve_all(config);
    resolved.are_identical =
        normalize::are_identical(&resolved.uri1, &resolved.uri2).unwrap_or(false);

    (Some(resolved), result)
}
