//! Download orchestration
//!
//! The [`Downloader`] drives one object through its lifecycle:
//!
//! - **Initializing**: validate settings, fetch metadata, size the destination
//! - **Downloading**: run batches of range fetches one after another, each
//!   batch fully joined before the next is planned
//! - **Verifying**: check the file length and its CRC32C
//! - **Done** or **Failed**
//!
//! A failed batch ends the job with that batch's first error. The partially
//! written destination is left on disk.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parallel_download::app::{Downloader, DownloaderConfig, MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! store.insert("greeting", b"hello world".to_vec());
//!
//! let downloader = Downloader::new(Arc::new(store), DownloaderConfig::default());
//! let report = downloader.start_download("greeting", "greeting.txt").await?;
//! println!("{} bytes, crc32c {}", report.size, report.crc32c);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod job;
pub mod progress;
pub mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::fetcher::RangeFetcher;
use super::file::LocalFile;
use super::policy::ChunkPlanner;
use super::scheduler::BatchScheduler;
use super::signals::is_shutdown_requested;
use super::store::ObjectStore;
use super::verifier::Verifier;
use crate::errors::{ConfigError, DownloadError, DownloadResult};

pub use config::DownloaderConfig;
pub use job::{DownloadJob, JobState};
pub use progress::{ProgressEvent, ProgressSink};
pub use report::{DownloadReport, TransferStats, Verification};

/// Downloads objects by parallel range reads into a local file
pub struct Downloader {
    store: Arc<dyn ObjectStore>,
    config: DownloaderConfig,
    progress: ProgressSink,
    shutdown: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of the batch loop
struct Transfer {
    stats: TransferStats,
    peak_parallelism: usize,
}

impl Downloader {
    /// Create a downloader reading from `store`
    pub fn new(store: Arc<dyn ObjectStore>, config: DownloaderConfig) -> Self {
        Self {
            store,
            config,
            progress: ProgressSink::disabled(),
            shutdown: None,
        }
    }

    /// Send progress events to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = ProgressSink::new(tx);
        self
    }

    /// Stop at the next batch boundary once `rx` turns `true`
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    /// Downloader settings
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Fetch metadata for `object` and describe the job
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid settings or an unwritable destination
    /// (both before any network activity) and `Metadata` if the store cannot
    /// describe the object.
    pub async fn prepare(
        &self,
        object: &str,
        destination: impl Into<PathBuf>,
    ) -> DownloadResult<DownloadJob> {
        self.config.validate()?;

        let destination = destination.into();
        LocalFile::check_writable(&destination)
            .await
            .map_err(|source| ConfigError::DestinationUnwritable {
                path: destination.clone(),
                source,
            })?;

        let metadata = self
            .store
            .metadata(object)
            .await
            .map_err(DownloadError::Metadata)?;
        debug!(
            "Metadata for {}: {} bytes, crc32c {:?}",
            object, metadata.size, metadata.crc32c
        );

        Ok(DownloadJob::new(object, metadata, destination, &self.config)?)
    }

    /// Download `object` into `destination`
    pub async fn start_download(
        &self,
        object: &str,
        destination: impl Into<PathBuf>,
    ) -> DownloadResult<DownloadReport> {
        let job = match self.prepare(object, destination).await {
            Ok(job) => job,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        self.run_job(job).await
    }

    /// Run a job whose metadata is already known
    pub async fn run_job(&self, job: DownloadJob) -> DownloadResult<DownloadReport> {
        match self.execute(&job).await {
            Ok(report) => {
                self.transition(&job, JobState::Done);
                info!(
                    "Downloaded {} ({} bytes) in {:.2?}, {:.2} MiB/s, crc32c {} ({:?})",
                    job.object(),
                    report.size,
                    report.total_duration(),
                    report.throughput_mib_s(),
                    report.crc32c,
                    report.verification
                );
                self.progress.emit(ProgressEvent::Finished {
                    bytes: report.bytes_downloaded,
                    throughput_bps: report.throughput_bps(),
                });
                Ok(report)
            }
            Err(e) => {
                self.transition(&job, JobState::Failed);
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &DownloadJob) -> DownloadResult<DownloadReport> {
        let started_at = Utc::now();
        self.transition(job, JobState::Initializing);
        self.progress.emit(ProgressEvent::JobStarted {
            object: job.object().to_string(),
            total_bytes: job.size(),
        });

        let expected = match job.expected_crc32c() {
            Some(crc) => Some(crc),
            None if job.size() == 0 || self.config.require_checksum => {
                return Err(ConfigError::MissingChecksum {
                    object: job.object().to_string(),
                }
                .into());
            }
            None => {
                warn!(
                    "No CRC32C available for {}, content will not be verified",
                    job.object()
                );
                None
            }
        };

        let mut planner = ChunkPlanner::new(*job.policy(), job.parallelism())?;
        let scheduler = BatchScheduler::new(job.parallelism())?;

        let file = LocalFile::create(job.destination(), job.size())
            .await
            .map_err(|e| DownloadError::local_io(job.destination(), None, e))?;

        let transfer_started = Instant::now();
        let transfer = if job.size() > 0 {
            self.transition(job, JobState::Downloading);
            let fetcher = RangeFetcher::new(Arc::clone(&self.store), job.object(), file.clone());
            self.transfer(job, &mut planner, &scheduler, &fetcher).await
        } else {
            Ok(Transfer {
                stats: TransferStats::new(0),
                peak_parallelism: 0,
            })
        };

        // The handle is closed whether or not the transfer succeeded
        let closed = file
            .close()
            .await
            .map_err(|e| DownloadError::local_io(job.destination(), None, e));
        let transfer = transfer?;
        closed?;
        let transfer_duration = transfer_started.elapsed();

        self.transition(job, JobState::Verifying);
        let verify_started = Instant::now();

        if transfer.stats.covered_bytes != job.size() {
            return Err(DownloadError::SizeMismatch {
                expected: job.size(),
                actual: transfer.stats.covered_bytes,
            });
        }
        let on_disk = tokio::fs::metadata(job.destination())
            .await
            .map_err(|e| DownloadError::local_io(job.destination(), None, e))?
            .len();
        if on_disk != job.size() {
            return Err(DownloadError::SizeMismatch {
                expected: job.size(),
                actual: on_disk,
            });
        }

        let verifier = Verifier::new(self.config.verify_buffer_size);
        let (crc32c, verification) = match expected {
            Some(expected) => (
                verifier.verify(job.destination(), expected).await?,
                Verification::Verified,
            ),
            None => (
                verifier.checksum_file(job.destination()).await?,
                Verification::Unverified,
            ),
        };

        Ok(DownloadReport {
            object: job.object().to_string(),
            destination: job.destination().to_path_buf(),
            size: job.size(),
            bytes_downloaded: transfer.stats.covered_bytes,
            batches: transfer.stats.batches_completed,
            policy: job.policy().name().to_string(),
            parallelism: job.parallelism(),
            peak_parallelism: transfer.peak_parallelism,
            started_at,
            transfer_duration,
            verify_duration: verify_started.elapsed(),
            crc32c,
            verification,
        })
    }

    async fn transfer(
        &self,
        job: &DownloadJob,
        planner: &mut ChunkPlanner,
        scheduler: &BatchScheduler,
        fetcher: &RangeFetcher,
    ) -> DownloadResult<Transfer> {
        let size = job.size();
        let mut stats = TransferStats::new(size);
        let mut cursor = 0u64;

        while let Some(batch) = planner.next_batch(cursor, size) {
            if self.shutdown_requested() {
                warn!(
                    "Shutdown requested, stopping {} at {} of {} bytes",
                    job.object(),
                    cursor,
                    size
                );
                return Err(DownloadError::Interrupted {
                    covered: cursor,
                    size,
                });
            }

            debug!(
                "Batch {}: {} ranges of up to {} bytes covering {:?}",
                batch.index,
                batch.len(),
                batch.chunk_size,
                batch.span()
            );
            self.progress.emit(ProgressEvent::BatchStarted {
                index: batch.index,
                span: batch.span(),
                ranges: batch.len(),
                chunk_size: batch.chunk_size,
            });

            let outcome = scheduler.run_batch(&batch, fetcher).await?;

            cursor += outcome.bytes;
            stats.record_batch(outcome.bytes, outcome.ranges);
            planner.advance();

            info!(
                "Batch {} complete: {}/{} bytes ({:.1}%)",
                batch.index,
                cursor,
                size,
                stats.completion_percentage()
            );
            self.progress.emit(ProgressEvent::BatchCompleted {
                index: batch.index,
                bytes: outcome.bytes,
                covered_bytes: cursor,
                total_bytes: size,
            });
        }

        Ok(Transfer {
            stats,
            peak_parallelism: scheduler.peak_active(),
        })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(is_shutdown_requested)
    }

    fn transition(&self, job: &DownloadJob, state: JobState) {
        if state.is_terminal() {
            info!("{}: {}", job.object(), state);
        } else {
            debug!("{}: {}", job.object(), state);
        }
        self.progress.emit(ProgressEvent::StateChanged { state });
    }

    fn fail(&self, e: &DownloadError) {
        match e.range() {
            Some(range) => error!("Download failed ({}) at range {}: {}", e.kind(), range, e),
            None => error!("Download failed ({}): {}", e.kind(), e),
        }
        self.progress.emit(ProgressEvent::Failed {
            kind: e.kind(),
            message: e.to_string(),
        });
    }
}
