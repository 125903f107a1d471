//! Fetching one byte range into its place in the destination file

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, trace};

use super::file::LocalFile;
use super::range::RangeDescriptor;
use super::store::ObjectStore;
use crate::errors::{DownloadError, DownloadResult};

/// Streams one remote range into the matching span of the local file
///
/// Cloning is cheap; every fetch task of a batch holds its own clone.
#[derive(Clone)]
pub struct RangeFetcher {
    store: Arc<dyn ObjectStore>,
    object: Arc<str>,
    file: LocalFile,
}

impl std::fmt::Debug for RangeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeFetcher")
            .field("object", &self.object)
            .field("file", &self.file.path())
            .finish()
    }
}

impl RangeFetcher {
    /// Create a fetcher for `object` writing into `file`
    pub fn new(store: Arc<dyn ObjectStore>, object: impl Into<Arc<str>>, file: LocalFile) -> Self {
        Self {
            store,
            object: object.into(),
            file,
        }
    }

    /// Object being fetched
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Fetch `range` and write it at `range.offset()`
    ///
    /// Returns the number of bytes written, which always equals the range
    /// length on success. Bytes outside the range are never written.
    ///
    /// # Errors
    ///
    /// - `Transport` if the store fails to open or continue the stream
    /// - `ShortWrite` if the stream ends early
    /// - `Overrun` if the stream yields more than the range length
    /// - `LocalIo` if the positional write fails
    pub async fn fetch(&self, range: RangeDescriptor) -> DownloadResult<u64> {
        debug!("Fetching range {} of {}", range, self.object);

        let mut stream = self
            .store
            .read_range(&self.object, range.offset(), range.length())
            .await
            .map_err(|source| DownloadError::Transport { range, source })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| DownloadError::Transport { range, source })?;
            if chunk.is_empty() {
                continue;
            }

            let chunk_len = chunk.len() as u64;
            if written + chunk_len > range.length() {
                return Err(DownloadError::Overrun { range });
            }

            self.file
                .write_at(range.offset() + written, chunk)
                .await
                .map_err(|e| DownloadError::local_io(self.file.path(), Some(range), e))?;
            written += chunk_len;
            trace!("Range {}: {}/{} bytes", range, written, range.length());
        }

        if written != range.length() {
            return Err(DownloadError::ShortWrite { range, written });
        }

        debug!("Range {} complete", range);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::{ByteStream, MemoryStore, ObjectMetadata};
    use crate::errors::{StoreError, StoreResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use tempfile::tempdir;

    /// Store whose range bodies are a fixed list of chunks
    struct ScriptedStore {
        chunks: Vec<Result<Bytes, ()>>,
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn metadata(&self, _object: &str) -> StoreResult<ObjectMetadata> {
            unreachable!("not used by the fetcher")
        }

        async fn read_range(&self, _object: &str, _offset: u64, _length: u64) -> StoreResult<ByteStream> {
            let items: Vec<Result<Bytes, StoreError>> = self
                .chunks
                .iter()
                .map(|c| {
                    c.clone()
                        .map_err(|_| StoreError::Other("connection reset".to_string()))
                })
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    async fn fetch_with(store: Arc<dyn ObjectStore>, size: u64, range: RangeDescriptor) -> (DownloadResult<u64>, Vec<u8>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let file = LocalFile::create(&path, size).await.unwrap();
        let fetcher = RangeFetcher::new(store, "object", file.clone());
        let result = fetcher.fetch(range).await;
        drop(fetcher);
        file.close().await.unwrap();
        (result, std::fs::read(&path).unwrap())
    }

    #[tokio::test]
    async fn test_writes_only_its_span() {
        let store = MemoryStore::new().with_stream_chunk(3);
        store.insert("object", (1u8..=20).collect::<Vec<_>>());

        let range = RangeDescriptor::new(5, 10).unwrap();
        let (result, contents) = fetch_with(Arc::new(store), 20, range).await;

        assert_eq!(result.unwrap(), 10);
        assert!(contents[..5].iter().all(|&b| b == 0));
        assert_eq!(&contents[5..15], &(6u8..=15).collect::<Vec<_>>()[..]);
        assert!(contents[15..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_premature_end_is_short_write() {
        let store = ScriptedStore {
            chunks: vec![Ok(Bytes::from_static(b"abcd"))],
        };
        let range = RangeDescriptor::new(0, 10).unwrap();
        let (result, _) = fetch_with(Arc::new(store), 10, range).await;

        match result {
            Err(DownloadError::ShortWrite { range: r, written }) => {
                assert_eq!(r, range);
                assert_eq!(written, 4);
            }
            other => panic!("Expected ShortWrite, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_without_spilling() {
        let store = ScriptedStore {
            chunks: vec![
                Ok(Bytes::from_static(b"abcd")),
                Ok(Bytes::from_static(b"efgh")),
            ],
        };
        let range = RangeDescriptor::new(2, 6).unwrap();
        let (result, contents) = fetch_with(Arc::new(store), 12, range).await;

        assert!(matches!(result, Err(DownloadError::Overrun { .. })));
        assert!(contents[8..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_stream_error_is_transport_error() {
        let store = ScriptedStore {
            chunks: vec![Ok(Bytes::from_static(b"ab")), Err(())],
        };
        let range = RangeDescriptor::new(0, 4).unwrap();
        let (result, _) = fetch_with(Arc::new(store), 4, range).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.range(), Some(range));
    }

    #[tokio::test]
    async fn test_missing_object_is_transport_error() {
        let range = RangeDescriptor::new(0, 4).unwrap();
        let (result, _) = fetch_with(Arc::new(MemoryStore::new()), 4, range).await;

        match result {
            Err(DownloadError::Transport {
                source: StoreError::NotFound { .. },
                ..
            }) => {}
            other => panic!("Expected Transport(NotFound), got {:?}", other),
        }
    }
}
