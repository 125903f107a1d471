//! In-process object store
//!
//! Objects live in a map behind a read-write lock. Range reads are served
//! as a stream of fixed-size slices so consumers see the same multi-chunk
//! bodies they would get from a network store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use super::{ByteStream, ObjectMetadata, ObjectStore};
use crate::app::checksum::Crc32c;
use crate::errors::{StoreError, StoreResult};

const DEFAULT_STREAM_CHUNK: usize = 16 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    crc32c: Option<Crc32c>,
}

/// Object store holding its objects in memory
#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    stream_chunk: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            stream_chunk: DEFAULT_STREAM_CHUNK,
        }
    }

    /// Serve range bodies in slices of `stream_chunk` bytes
    pub fn with_stream_chunk(mut self, stream_chunk: usize) -> Self {
        self.stream_chunk = stream_chunk.max(1);
        self
    }

    /// Store `data` under `name`, publishing its CRC32C
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        let data = data.into();
        let crc32c = Some(Crc32c::of(&data));
        self.put(name.into(), StoredObject { data, crc32c });
    }

    /// Store `data` under `name` with an explicit (possibly wrong or absent)
    /// published checksum
    pub fn insert_with_checksum(
        &self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        crc32c: Option<Crc32c>,
    ) {
        self.put(
            name.into(),
            StoredObject {
                data: data.into(),
                crc32c,
            },
        );
    }

    fn put(&self, name: String, object: StoredObject) {
        // A poisoned lock still holds a consistent map
        let mut objects = match self.objects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        objects.insert(name, object);
    }

    fn lookup(&self, object: &str) -> StoreResult<StoredObject> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))?;
        objects
            .get(object)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                object: object.to_string(),
            })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn metadata(&self, object: &str) -> StoreResult<ObjectMetadata> {
        let stored = self.lookup(object)?;
        Ok(ObjectMetadata {
            size: stored.data.len() as u64,
            crc32c: stored.crc32c,
        })
    }

    async fn read_range(&self, object: &str, offset: u64, length: u64) -> StoreResult<ByteStream> {
        let stored = self.lookup(object)?;
        let size = stored.data.len() as u64;
        let end = offset.checked_add(length).filter(|&end| end <= size).ok_or_else(|| {
            StoreError::InvalidResponse {
                reason: format!(
                    "range {}+{} outside object of {} bytes",
                    offset, length, size
                ),
            }
        })?;

        let body = stored.data.slice(offset as usize..end as usize);
        let chunk = self.stream_chunk;
        let pieces: Vec<Bytes> = (0..body.len())
            .step_by(chunk)
            .map(|start| body.slice(start..(start + chunk).min(body.len())))
            .collect();

        Ok(stream::iter(pieces.into_iter().map(Ok)).boxed())
    }
}
