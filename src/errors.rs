//! Error types for the parallel downloader
//!
//! Errors are split by the component that raises them. The object store
//! client reports [`StoreError`]; everything that happens while running a
//! job is a [`DownloadError`], which always carries enough context (the
//! failing byte range, the path, the underlying cause) to tell which part
//! of the object went wrong.

use std::path::PathBuf;

use thiserror::Error;

use crate::app::checksum::Crc32c;
use crate::app::range::RangeDescriptor;

/// Errors raised by an object store client
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist
    #[error("Object not found: {object}")]
    NotFound { object: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Access to the object was refused
    #[error("Access denied to object: {object} (HTTP {status})")]
    AccessDenied { object: String, status: u16 },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    /// The response did not have the expected shape
    #[error("Invalid response from object store: {reason}")]
    InvalidResponse { reason: String },

    /// Invalid object URL
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Any other store-side failure
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Http(_)
                | StoreError::RateLimitExceeded
                | StoreError::ServerOverloaded
                | StoreError::ServerError { .. }
        )
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// A checksum is required but the object store did not provide one
    #[error("No expected CRC32C checksum available for {object}")]
    MissingChecksum { object: String },

    /// Destination cannot be created or written
    #[error("Destination {path} is not writable: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`]
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors terminating a download job
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Object metadata could not be fetched
    #[error("Failed to fetch object metadata: {0}")]
    Metadata(#[source] StoreError),

    /// Remote range read failed
    #[error("Transport error for range {range}: {source}")]
    Transport {
        range: RangeDescriptor,
        #[source]
        source: StoreError,
    },

    /// Fewer bytes than the range length arrived before the stream ended
    #[error("Short write for range {range}: wrote {written} of {} bytes", .range.length())]
    ShortWrite { range: RangeDescriptor, written: u64 },

    /// The stream delivered more bytes than the range length
    #[error("Range {range} received more than {} bytes", .range.length())]
    Overrun { range: RangeDescriptor },

    /// Opening, sizing, writing or syncing the destination failed
    #[error("Local I/O error on {}{}: {source}", .path.display(), fmt_range(.range))]
    LocalIo {
        path: PathBuf,
        range: Option<RangeDescriptor>,
        #[source]
        source: std::io::Error,
    },

    /// The written file does not have the object's length
    #[error("File size mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Post-download checksum mismatch
    #[error("CRC32C mismatch. Expected: {expected}, got: {actual}")]
    Integrity { expected: Crc32c, actual: Crc32c },

    /// A fetch task panicked or was aborted
    #[error("Fetch task for range {range} failed: {reason}")]
    TaskFailed {
        range: RangeDescriptor,
        reason: String,
    },

    /// Shutdown was requested between batches
    #[error("Download interrupted after {covered} of {size} bytes")]
    Interrupted { covered: u64, size: u64 },

    /// Invalid job parameters
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn fmt_range(range: &Option<RangeDescriptor>) -> String {
    range
        .map(|r| format!(" (range {})", r))
        .unwrap_or_default()
}

impl DownloadError {
    /// Build a [`DownloadError::LocalIo`] for the given path
    pub fn local_io(
        path: impl Into<PathBuf>,
        range: Option<RangeDescriptor>,
        source: std::io::Error,
    ) -> Self {
        Self::LocalIo {
            path: path.into(),
            range,
            source,
        }
    }

    /// Name of the error kind, for reporting
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadError::Metadata(StoreError::NotFound { .. }) => "not_found",
            DownloadError::Metadata(_) => "metadata",
            DownloadError::Transport { .. } => "transport",
            DownloadError::ShortWrite { .. } | DownloadError::Overrun { .. } => "short_write",
            DownloadError::LocalIo { .. } => "local_io",
            DownloadError::SizeMismatch { .. } => "size_mismatch",
            DownloadError::Integrity { .. } => "integrity",
            DownloadError::TaskFailed { .. } => "task_failed",
            DownloadError::Interrupted { .. } => "interrupted",
            DownloadError::Config(_) => "config",
        }
    }

    /// The byte range the error is attributed to, if any
    pub fn range(&self) -> Option<RangeDescriptor> {
        match self {
            DownloadError::Transport { range, .. }
            | DownloadError::ShortWrite { range, .. }
            | DownloadError::Overrun { range }
            | DownloadError::TaskFailed { range, .. } => Some(*range),
            DownloadError::LocalIo { range, .. } => *range,
            _ => None,
        }
    }
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download job error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Object store error outside of a job
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable by running the job again
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Download(DownloadError::Transport { source, .. })
            | AppError::Download(DownloadError::Metadata(source))
            | AppError::Store(source) => source.is_transient(),
            AppError::Download(DownloadError::ShortWrite { .. }) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Download(e) => e.kind(),
            AppError::Store(_) => "store",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Object store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_kind_and_range() {
        let range = RangeDescriptor::new(30, 30).unwrap();
        let err = DownloadError::Transport {
            range,
            source: StoreError::ServerOverloaded,
        };
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.range(), Some(range));
        assert!(err.to_string().contains("[30, 60)"));

        let err = DownloadError::Integrity {
            expected: Crc32c::new(1),
            actual: Crc32c::new(2),
        };
        assert_eq!(err.kind(), "integrity");
        assert_eq!(err.range(), None);
    }

    #[test]
    fn test_local_io_display_includes_range() {
        let range = RangeDescriptor::new(0, 10).unwrap();
        let err = DownloadError::local_io(
            "/tmp/out.bin",
            Some(range),
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/out.bin"));
        assert!(message.contains("[0, 10)"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn test_app_error_category() {
        let app_error = AppError::from(DownloadError::Config(ConfigError::invalid(
            "parallelism",
            0,
            "must be at least 1",
        )));
        assert_eq!(app_error.category(), "config");
        assert!(!app_error.is_recoverable());

        let transient = AppError::from(DownloadError::Metadata(StoreError::ServerOverloaded));
        assert!(transient.is_recoverable());

        let not_found = AppError::from(DownloadError::Metadata(StoreError::NotFound {
            object: "x".to_string(),
        }));
        assert_eq!(not_found.category(), "not_found");
        assert!(!not_found.is_recoverable());
    }
}
