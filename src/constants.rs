//! Application constants for the parallel downloader
//!
//! This module centralizes all constants used throughout the crate,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Size units
pub mod sizes {
    /// One kibibyte
    pub const KIB: u64 = 1024;

    /// One mebibyte
    pub const MIB: u64 = 1024 * 1024;

    /// One gibibyte
    pub const GIB: u64 = 1024 * 1024 * 1024;
}

/// Defaults for the range-partitioned download job
pub mod download {
    use super::sizes::MIB;

    /// Default size of a single range request under the fixed policy
    pub const DEFAULT_REQUEST_SIZE: u64 = 50 * MIB;

    /// Default number of concurrent range fetches per batch
    pub const DEFAULT_PARALLELISM: usize = 32;

    /// Upper bound accepted for the parallelism setting
    pub const MAX_PARALLELISM: usize = 1024;

    /// First chunk size used by the incremental-growth policy
    pub const DEFAULT_INITIAL_CHUNK_SIZE: u64 = 8 * MIB;

    /// Chunk size multiplier applied after every successful batch
    pub const DEFAULT_GROWTH_FACTOR: u64 = 2;

    /// Read buffer used when streaming a file through the checksum
    pub const VERIFY_BUFFER_SIZE: usize = 64 * 1024;

    /// Capacity of the progress event channel
    pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("parallel-download/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout (covers a whole range body)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 64;

    /// Header carrying base64 checksums on Google Cloud Storage style endpoints
    pub const GOOG_HASH_HEADER: &str = "x-goog-hash";

    /// Plain hex CRC32C header understood as a fallback
    pub const CRC32C_HEADER: &str = "x-checksum-crc32c";
}

/// Rate limiting and retry configuration for the object store client
pub mod limits {
    /// Default request rate limit (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 200;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    /// Jitter factor for randomizing delays (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;
}

/// Environment variable names
pub mod env {
    /// Overrides the log filter, same syntax as `RUST_LOG`
    pub const LOG: &str = "PARALLEL_DOWNLOAD_LOG";
}

/// File and path constants
pub mod files {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "parallel-download.toml";

    /// Directory name under the user config directory
    pub const CONFIG_DIR_NAME: &str = "parallel-download";

    /// Configuration file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Destination used when the object URL has no usable file name
    pub const FALLBACK_OUTPUT_NAME: &str = "download.bin";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use download::{DEFAULT_PARALLELISM, DEFAULT_REQUEST_SIZE};
pub use http::USER_AGENT;
pub use sizes::MIB;
