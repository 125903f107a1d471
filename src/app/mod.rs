//! Core application logic for the parallel downloader
//!
//! This module contains the download pipeline: range planning, the object
//! store clients, positional file writes, bounded batch scheduling, the job
//! orchestrator and CRC32C verification.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parallel_download::app::{
//!     ChunkPolicy, ClientConfig, Downloader, DownloaderConfig, HttpObjectStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpObjectStore::new(ClientConfig::default())?;
//!
//! let config = DownloaderConfig::default()
//!     .with_parallelism(16)
//!     .with_policy(ChunkPolicy::incremental(8 * 1024 * 1024));
//!
//! let downloader = Downloader::new(Arc::new(store), config);
//! let report = downloader
//!     .start_download("https://storage.googleapis.com/bucket/object", "object.bin")
//!     .await?;
//! println!("{} bytes in {} batches", report.size, report.batches);
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod downloader;
pub mod fetcher;
pub mod file;
pub mod policy;
pub mod range;
pub mod scheduler;
pub mod signals;
pub mod store;
pub mod verifier;

// Re-export main public API
pub use checksum::{Crc32c, Crc32cHasher};
pub use downloader::{
    DownloadJob, DownloadReport, Downloader, DownloaderConfig, JobState, ProgressEvent,
    TransferStats, Verification,
};
pub use fetcher::RangeFetcher;
pub use file::LocalFile;
pub use policy::{ChunkPlanner, ChunkPolicy, Partition};
pub use range::{Batch, RangeDescriptor};
pub use scheduler::{BatchOutcome, BatchScheduler};
pub use signals::{shutdown_channel, ShutdownTrigger};
pub use store::{
    ByteStream, ClientConfig, HttpObjectStore, MemoryStore, ObjectMetadata, ObjectStore,
};
pub use verifier::Verifier;
