//! Remote object store abstraction
//!
//! The downloader only needs two capabilities from a store: object metadata
//! (size and published checksum) and a streamed read of a byte range. Retry,
//! authentication and connection pooling live behind this trait and are
//! opaque to the download job.
//!
//! - [`config`] - HTTP client settings
//! - [`http`] - reqwest-backed store for plain HTTP(S) and object-store URLs
//! - [`memory`] - in-process objects, used for tests and dry runs

pub mod config;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::checksum::Crc32c;
use crate::errors::{StoreError, StoreResult};

pub use config::ClientConfig;
pub use http::HttpObjectStore;
pub use memory::MemoryStore;

/// Stream of body chunks returned by a range read
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// What the store knows about an object before it is downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object length in bytes
    pub size: u64,
    /// Checksum published by the store, if any
    pub crc32c: Option<Crc32c>,
}

/// Remote range-read capability
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch size and checksum of `object`
    ///
    /// Fails with [`StoreError::NotFound`] when the object does not exist.
    async fn metadata(&self, object: &str) -> StoreResult<ObjectMetadata>;

    /// Open a stream over `length` bytes of `object` starting at `offset`
    async fn read_range(&self, object: &str, offset: u64, length: u64) -> StoreResult<ByteStream>;
}
