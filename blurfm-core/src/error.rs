use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the Blur FM player core.
///
/// Network and decode failures in the metadata and artwork paths are
/// recovered locally by the synchronizer; pipeline failures surface through
/// the playback controller's `has_error` observable. Nothing here is fatal
/// to the process.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Config file did not exist; a template was written in its place.
    #[error("config file not found at {path}; a template has been created - edit it and restart")]
    ConfigNotFound { path: PathBuf },

    /// Config file exists but is not valid TOML.
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A required config field is missing or empty.
    #[error("missing required config field: {field}")]
    ConfigMissingField { field: String },

    /// A configured base URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport-level failure: timeout, unreachable host, refused
    /// connection, or a malformed response body.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A service answered with a non-success HTTP status.
    #[error("{service} returned status {status}")]
    ServiceStatus { service: &'static str, status: u16 },

    /// The streaming pipeline could not be built or failed during playback.
    #[error("stream pipeline failed: {reason}")]
    Pipeline { reason: String },

    /// Failed to read or write the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
