//! Bounded fan-out of one batch of range fetches
//!
//! Every range of a batch runs as its own tokio task, but a task only starts
//! fetching after it holds one of `parallelism` semaphore permits, so at most
//! `parallelism` fetches are ever active. The scheduler then waits for every
//! task of the batch before reporting: a failing range does not cancel its
//! siblings, and the caller sees the error only once the whole batch has
//! terminated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::fetcher::RangeFetcher;
use super::range::{Batch, RangeDescriptor};
use crate::errors::{ConfigError, ConfigResult, DownloadError, DownloadResult};

/// Result of a fully successful batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Bytes written by the batch
    pub bytes: u64,
    /// Number of ranges fetched
    pub ranges: usize,
    /// Wall time from dispatch to join
    pub elapsed: Duration,
}

/// Runs batches of range fetches with bounded parallelism
#[derive(Debug)]
pub struct BatchScheduler {
    parallelism: usize,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    peak_active: Arc<AtomicUsize>,
}

impl BatchScheduler {
    /// Create a scheduler allowing `parallelism` concurrent fetches
    pub fn new(parallelism: usize) -> ConfigResult<Self> {
        if parallelism == 0 {
            return Err(ConfigError::invalid(
                "parallelism",
                parallelism,
                "Parallelism must be at least 1",
            ));
        }
        Ok(Self {
            parallelism,
            permits: Arc::new(Semaphore::new(parallelism)),
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Configured concurrency limit
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Highest number of simultaneously active fetches seen so far
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Fetch every range of `batch` and wait for all of them
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed range in dispatch order, after
    /// every other range of the batch has run to completion.
    pub async fn run_batch(
        &self,
        batch: &Batch,
        fetcher: &RangeFetcher,
    ) -> DownloadResult<BatchOutcome> {
        debug_assert!(
            batch.ranges.windows(2).all(|pair| !pair[0].overlaps(&pair[1])),
            "batch ranges must be disjoint"
        );
        let started = Instant::now();
        debug!(
            "Dispatching batch {} with {} ranges ({} bytes)",
            batch.index,
            batch.len(),
            batch.bytes()
        );

        let handles: Vec<_> = batch
            .ranges
            .iter()
            .map(|&range| {
                let fetcher = fetcher.clone();
                let permits = Arc::clone(&self.permits);
                let active = Arc::clone(&self.active);
                let peak_active = Arc::clone(&self.peak_active);

                let handle = tokio::spawn(async move {
                    let _permit =
                        permits
                            .acquire_owned()
                            .await
                            .map_err(|e| DownloadError::TaskFailed {
                                range,
                                reason: e.to_string(),
                            })?;

                    let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak_active.fetch_max(now_active, Ordering::SeqCst);

                    let result = fetcher.fetch(range).await;

                    active.fetch_sub(1, Ordering::SeqCst);
                    result
                });
                (range, handle)
            })
            .collect();

        let (ranges, handles): (Vec<RangeDescriptor>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut bytes = 0u64;
        let mut first_error: Option<DownloadError> = None;
        let mut failures = 0usize;

        for (range, joined) in ranges.into_iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                Err(DownloadError::TaskFailed {
                    range,
                    reason: e.to_string(),
                })
            });

            match result {
                Ok(written) => bytes += written,
                Err(e) => {
                    failures += 1;
                    warn!("Range {} failed: {}", range, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            warn!(
                "Batch {} failed: {} of {} ranges did not complete",
                batch.index,
                failures,
                batch.len()
            );
            return Err(e);
        }

        let outcome = BatchOutcome {
            bytes,
            ranges: batch.len(),
            elapsed: started.elapsed(),
        };
        debug!(
            "Batch {} joined: {} bytes in {:?}",
            batch.index, outcome.bytes, outcome.elapsed
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::file::LocalFile;
    use crate::app::policy::{ChunkPlanner, ChunkPolicy};
    use crate::app::store::{ByteStream, MemoryStore, ObjectMetadata, ObjectStore};
    use crate::errors::StoreResult;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Store whose read of one offset panics inside the fetch task
    struct PanickingStore {
        inner: MemoryStore,
        panic_offset: u64,
    }

    #[async_trait]
    impl ObjectStore for PanickingStore {
        async fn metadata(&self, object: &str) -> StoreResult<ObjectMetadata> {
            self.inner.metadata(object).await
        }

        async fn read_range(
            &self,
            object: &str,
            offset: u64,
            length: u64,
        ) -> StoreResult<ByteStream> {
            if offset == self.panic_offset {
                panic!("read at offset {} blew up", offset);
            }
            self.inner.read_range(object, offset, length).await
        }
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        assert!(BatchScheduler::new(0).is_err());
        assert_eq!(BatchScheduler::new(3).unwrap().parallelism(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_writes_every_range() {
        let data: Vec<u8> = (0..100u8).collect();
        let store = MemoryStore::new().with_stream_chunk(7);
        store.insert("object", data.clone());

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let file = LocalFile::create(&path, 100).await.unwrap();
        let fetcher = RangeFetcher::new(Arc::new(store), "object", file.clone());

        let mut planner = ChunkPlanner::new(ChunkPolicy::fixed(30), 2).unwrap();
        let scheduler = BatchScheduler::new(2).unwrap();

        let mut cursor = 0;
        while let Some(batch) = planner.next_batch(cursor, 100) {
            let outcome = scheduler.run_batch(&batch, &fetcher).await.unwrap();
            assert_eq!(outcome.bytes, batch.bytes());
            assert_eq!(outcome.ranges, batch.len());
            cursor += outcome.bytes;
        }
        assert_eq!(cursor, 100);
        assert!(scheduler.peak_active() <= 2);

        drop(fetcher);
        file.close().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[tokio::test]
    async fn test_failed_range_is_reported_after_join() {
        let store = MemoryStore::new();
        store.insert("object", vec![7u8; 50]);

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        // Destination larger than the object: the last range reads past the end
        let file = LocalFile::create(&path, 60).await.unwrap();
        let fetcher = RangeFetcher::new(Arc::new(store), "object", file.clone());

        let batch = Batch {
            index: 1,
            chunk_size: 30,
            ranges: vec![
                RangeDescriptor::new(0, 30).unwrap(),
                RangeDescriptor::new(30, 30).unwrap(),
            ],
        };
        let scheduler = BatchScheduler::new(2).unwrap();
        let err = scheduler.run_batch(&batch, &fetcher).await.unwrap_err();

        assert_eq!(err.kind(), "transport");
        assert_eq!(err.range(), RangeDescriptor::new(30, 30));

        drop(fetcher);
        file.close().await.unwrap();
        let contents = std::fs::read(&path).unwrap();
        assert!(contents[..30].iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn test_panicked_fetch_is_task_failure() {
        let inner = MemoryStore::new();
        inner.insert("object", vec![9u8; 60]);
        let store = PanickingStore {
            inner,
            panic_offset: 0,
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let file = LocalFile::create(&path, 60).await.unwrap();
        let fetcher = RangeFetcher::new(Arc::new(store), "object", file.clone());

        let batch = Batch {
            index: 1,
            chunk_size: 30,
            ranges: vec![
                RangeDescriptor::new(0, 30).unwrap(),
                RangeDescriptor::new(30, 30).unwrap(),
            ],
        };
        let scheduler = BatchScheduler::new(2).unwrap();
        let err = scheduler.run_batch(&batch, &fetcher).await.unwrap_err();

        assert_eq!(err.kind(), "task_failed");
        assert_eq!(err.range(), RangeDescriptor::new(0, 30));

        // The sibling range was still joined and written
        drop(fetcher);
        file.close().await.unwrap();
        let contents = std::fs::read(&path).unwrap();
        assert!(contents[30..].iter().all(|&b| b == 9));
        assert!(contents[..30].iter().all(|&b| b == 0));
    }
}
