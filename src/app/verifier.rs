//! Post-download integrity check
//!
//! The completed file is read front to back in fixed-size windows and folded
//! through a [`Crc32cHasher`]. This runs on a single task; the checksum is
//! inherently sequential and sits after the transfer.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::checksum::{Crc32c, Crc32cHasher};
use crate::constants::download;
use crate::errors::{DownloadError, DownloadResult};

/// Streams files through CRC32C
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    buffer_size: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(download::VERIFY_BUFFER_SIZE)
    }
}

impl Verifier {
    /// Create a verifier reading `buffer_size` bytes at a time
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// CRC32C of the whole file at `path`
    pub async fn checksum_file(&self, path: &Path) -> DownloadResult<Crc32c> {
        let io_err = |e| DownloadError::local_io(path, None, e);

        let mut file = File::open(path).await.map_err(io_err)?;
        let mut buffer = vec![0u8; self.buffer_size];
        let mut hasher = Crc32cHasher::new();

        loop {
            let n = file.read(&mut buffer).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        debug!(
            "Checksummed {} bytes of {}",
            hasher.bytes_processed(),
            path.display()
        );
        Ok(hasher.finalize())
    }

    /// Check the file at `path` against `expected`
    ///
    /// # Errors
    ///
    /// Returns `Integrity` with both values on mismatch, `LocalIo` if the
    /// file cannot be read.
    pub async fn verify(&self, path: &Path, expected: Crc32c) -> DownloadResult<Crc32c> {
        let actual = self.checksum_file(path).await?;
        if actual != expected {
            return Err(DownloadError::Integrity { expected, actual });
        }
        info!("CRC32C verified for {}: {}", path.display(), actual);
        Ok(actual)
    }
}
