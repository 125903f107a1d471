//! Destination file shared by concurrent range fetchers
//!
//! One OS handle is opened per job and shared through an `Arc`. Every write
//! names its own offset (`pwrite` on Unix, `seek_write` on Windows), so
//! writers never race on a shared cursor and no lock is taken on the data
//! path. Callers guarantee that concurrently active writers target disjoint
//! byte spans.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

/// Destination file opened for positional writes
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    file: Arc<File>,
}

impl LocalFile {
    /// Create (or truncate) `path` and size it to `size` bytes
    ///
    /// Missing parent directories are created.
    pub async fn create(path: impl AsRef<Path>, size: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&open_path)?;
            file.set_len(size)?;
            Ok(file)
        })
        .await
        .map_err(join_error)??;

        debug!("Opened {} ({} bytes)", path.display(), size);
        Ok(Self {
            path,
            file: Arc::new(file),
        })
    }

    /// Check that `path` could be opened for writing
    ///
    /// Missing parent directories are created. An existing destination is
    /// opened without truncation and a missing one is not created, so the
    /// check leaves no file behind.
    pub async fn check_writable(path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            match OpenOptions::new().write(true).open(&path) {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let parent = path
                        .parent()
                        .filter(|p| !p.as_os_str().is_empty())
                        .unwrap_or_else(|| Path::new("."));
                    let metadata = std::fs::metadata(parent)?;
                    if !metadata.is_dir() {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("{} is not a directory", parent.display()),
                        ));
                    }
                    if metadata.permissions().readonly() {
                        return Err(io::Error::new(
                            io::ErrorKind::PermissionDenied,
                            format!("{} is read-only", parent.display()),
                        ));
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(join_error)?
    }

    /// Path of the destination
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all of `data` starting at `offset`
    pub async fn write_at(&self, offset: u64, data: Bytes) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(join_error)?
    }

    /// Flush file contents to storage
    pub async fn sync(&self) -> io::Result<()> {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(join_error)?
    }

    /// Sync and release this handle
    ///
    /// The OS handle closes once the last clone is dropped; callers close
    /// only after every fetcher holding a clone has finished.
    pub async fn close(self) -> io::Result<()> {
        self.sync().await?;
        debug!("Closed {}", self.path.display());
        Ok(())
    }
}

fn join_error(e: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        match file.seek_write(data, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                data = &data[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
