//! Prelude module for the parallel downloader library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use parallel_download::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use parallel_download::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Arc::new(HttpObjectStore::new(ClientConfig::default())?);
//!     let downloader = Downloader::new(store, DownloaderConfig::default());
//!     let report = downloader
//!         .start_download("https://example.com/object.bin", PathBuf::from("object.bin"))
//!         .await?;
//!     println!("crc32c {}", report.crc32c);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, DownloadError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    ChunkPolicy, ClientConfig, Crc32c, DownloadReport, Downloader, DownloaderConfig,
    HttpObjectStore, MemoryStore, ObjectMetadata, ObjectStore, ProgressEvent, Verification,
};

// Configuration file support
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_PARALLELISM, DEFAULT_REQUEST_SIZE, MIB, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let config = DownloaderConfig::default();
        assert_eq!(config.parallelism, DEFAULT_PARALLELISM);
        assert_eq!(config.policy, ChunkPolicy::fixed(DEFAULT_REQUEST_SIZE));
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.insert("object", vec![1u8; 4096]);

        let downloader = Downloader::new(
            Arc::new(store),
            DownloaderConfig::default()
                .with_parallelism(4)
                .with_policy(ChunkPolicy::fixed(1000)),
        );
        let report = downloader
            .start_download("object", temp_dir.path().join("object.bin"))
            .await
            .unwrap();
        assert_eq!(report.verification, Verification::Verified);
        assert_eq!(report.batches, 2);
    }
}
