//! Configuration structures for the downloader
//!
//! This module defines the knobs of a download job: the parallelism limit,
//! the chunk policy and how strictly the result is verified.

use serde::{Deserialize, Serialize};

use crate::app::policy::ChunkPolicy;
use crate::constants::download;
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the downloader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Maximum number of concurrent range fetches
    pub parallelism: usize,
    /// How the object is cut into ranges
    pub policy: ChunkPolicy,
    /// Read buffer for the checksum pass
    pub verify_buffer_size: usize,
    /// Fail objects that have no published checksum instead of skipping
    /// verification
    pub require_checksum: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            parallelism: download::DEFAULT_PARALLELISM,
            policy: ChunkPolicy::default(),
            verify_buffer_size: download::VERIFY_BUFFER_SIZE,
            require_checksum: false,
        }
    }
}

impl DownloaderConfig {
    /// Set the parallelism limit
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the chunk policy
    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Require a published or supplied checksum
    pub fn with_require_checksum(mut self, required: bool) -> Self {
        self.require_checksum = required;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.parallelism == 0 {
            return Err(ConfigError::invalid(
                "parallelism",
                self.parallelism,
                "Parallelism must be at least 1",
            ));
        }

        if self.parallelism > download::MAX_PARALLELISM {
            return Err(ConfigError::invalid(
                "parallelism",
                self.parallelism,
                format!("Parallelism must not exceed {}", download::MAX_PARALLELISM),
            ));
        }

        if self.verify_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "verify_buffer_size",
                self.verify_buffer_size,
                "Verify buffer size must be greater than zero",
            ));
        }

        self.policy.validate()
    }
}
