//! Download statistics and the final job report
//!
//! This module handles the collection and reporting of per-job statistics:
//! bytes covered, batch count, peak concurrency, elapsed time and the
//! throughput derived from them.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::checksum::Crc32c;

/// How the finished file was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// The computed CRC32C matched the expected value
    Verified,
    /// No expected checksum was available; the computed value is reported only
    Unverified,
}

/// Final result of a successful download job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Object identity
    pub object: String,
    /// Local file written
    pub destination: PathBuf,
    /// Object size in bytes
    pub size: u64,
    /// Bytes written by range fetches
    pub bytes_downloaded: u64,
    /// Number of batches run
    pub batches: usize,
    /// Chunk policy name
    pub policy: String,
    /// Configured parallelism limit
    pub parallelism: usize,
    /// Highest number of simultaneously active fetches
    pub peak_parallelism: usize,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// Time spent transferring ranges
    #[serde(with = "humantime_serde")]
    pub transfer_duration: Duration,
    /// Time spent checksumming
    #[serde(with = "humantime_serde")]
    pub verify_duration: Duration,
    /// CRC32C of the written file
    pub crc32c: Crc32c,
    /// Verification outcome
    pub verification: Verification,
}

impl DownloadReport {
    /// Transfer throughput in bytes per second
    pub fn throughput_bps(&self) -> f64 {
        let seconds = self.transfer_duration.as_secs_f64();
        if seconds <= 0.0 {
            return 0.0;
        }
        self.bytes_downloaded as f64 / seconds
    }

    /// Transfer throughput in MiB per second
    pub fn throughput_mib_s(&self) -> f64 {
        self.throughput_bps() / crate::constants::MIB as f64
    }

    /// Total wall time of the job
    pub fn total_duration(&self) -> Duration {
        self.transfer_duration + self.verify_duration
    }

    /// Whether the content was checked against an expected checksum
    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }
}

/// Running counters of a job in progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Object size in bytes
    pub total_bytes: u64,
    /// Bytes covered by completed batches
    pub covered_bytes: u64,
    /// Completed batches
    pub batches_completed: usize,
    /// Ranges fetched by completed batches
    pub ranges_completed: usize,
}

impl TransferStats {
    /// Create statistics for an object of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            ..Default::default()
        }
    }

    /// Account for a completed batch
    pub fn record_batch(&mut self, bytes: u64, ranges: usize) {
        self.covered_bytes += bytes;
        self.batches_completed += 1;
        self.ranges_completed += ranges;
    }

    /// Calculate completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.covered_bytes as f64 / self.total_bytes as f64) * 100.0
    }

    /// Check if every byte is covered
    pub fn is_complete(&self) -> bool {
        self.covered_bytes >= self.total_bytes
    }
}
