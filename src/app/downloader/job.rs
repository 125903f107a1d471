//! Download job description and lifecycle states

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::config::DownloaderConfig;
use crate::app::checksum::Crc32c;
use crate::app::policy::ChunkPolicy;
use crate::app::store::ObjectMetadata;
use crate::errors::ConfigResult;

/// Everything needed to download one object, fixed once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    object: String,
    size: u64,
    expected_crc32c: Option<Crc32c>,
    destination: PathBuf,
    parallelism: usize,
    policy: ChunkPolicy,
}

impl DownloadJob {
    /// Build a job from object metadata and downloader settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the parallelism or chunk policy is invalid.
    pub fn new(
        object: impl Into<String>,
        metadata: ObjectMetadata,
        destination: impl Into<PathBuf>,
        config: &DownloaderConfig,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            object: object.into(),
            size: metadata.size,
            expected_crc32c: metadata.crc32c,
            destination: destination.into(),
            parallelism: config.parallelism,
            policy: config.policy,
        })
    }

    /// Replace the expected checksum, e.g. with one supplied by the user
    pub fn with_expected_crc32c(mut self, crc32c: Option<Crc32c>) -> Self {
        self.expected_crc32c = crc32c;
        self
    }

    /// Object identity
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Object length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Checksum the finished file must match
    pub fn expected_crc32c(&self) -> Option<Crc32c> {
        self.expected_crc32c
    }

    /// Local file the object is written to
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Maximum concurrent range fetches
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Chunking policy
    pub fn policy(&self) -> &ChunkPolicy {
        &self.policy
    }
}

/// Stage of a running job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Fetching metadata and preparing the destination
    Initializing,
    /// Running batches
    Downloading,
    /// Checksumming the finished file
    Verifying,
    /// Finished successfully
    Done,
    /// Terminated by an error
    Failed,
}

impl JobState {
    /// Whether the job can make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Initializing => "initializing",
            JobState::Downloading => "downloading",
            JobState::Verifying => "verifying",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_from_metadata() {
        let metadata = ObjectMetadata {
            size: 100,
            crc32c: Some(Crc32c::new(42)),
        };
        let config = DownloaderConfig::default()
            .with_parallelism(2)
            .with_policy(ChunkPolicy::fixed(30));

        let job = DownloadJob::new("bucket/object", metadata, "/tmp/out.bin", &config).unwrap();
        assert_eq!(job.object(), "bucket/object");
        assert_eq!(job.size(), 100);
        assert_eq!(job.expected_crc32c(), Some(Crc32c::new(42)));
        assert_eq!(job.destination(), Path::new("/tmp/out.bin"));
        assert_eq!(job.parallelism(), 2);
        assert_eq!(job.policy(), &ChunkPolicy::fixed(30));

        let job = job.with_expected_crc32c(None);
        assert_eq!(job.expected_crc32c(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let metadata = ObjectMetadata {
            size: 1,
            crc32c: None,
        };
        let config = DownloaderConfig::default().with_parallelism(0);
        assert!(DownloadJob::new("object", metadata, "out", &config).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Downloading.is_terminal());
        assert_eq!(JobState::Verifying.to_string(), "verifying");
    }
}
