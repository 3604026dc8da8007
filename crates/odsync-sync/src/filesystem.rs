//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Listings**: Symlinks and special files are skipped; only regular
//!   files and directories are returned.
//! - **CRC32**: Computed with `crc32fast` on a blocking thread, streaming the
//!   file in fixed-size blocks so large files are never held in memory.
//! - **Timestamps**: Birth time is used where the platform reports one and
//!   falls back to the modification time otherwise.
//! - **Atomic replace**: Downloads land in a temporary sibling and are moved
//!   into place with [`rename`](ILocalFileSystem::rename). Siblings ending in
//!   [`PARTIAL_SUFFIX`] are left out of listings.

use std::fs::Metadata;
use std::io::{ErrorKind, Read, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use odsync_core::domain::entry::system_time_to_utc;
use odsync_core::domain::{Crc32, EntryKind, LocalEntry};
use odsync_core::ports::ILocalFileSystem;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument};

/// Block size for streaming checksums
const CHECKSUM_BLOCK: usize = 64 * 1024;

/// Name suffix of in-progress downloads
pub const PARTIAL_SUFFIX: &str = ".odsync-partial";

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Builds a [`LocalEntry`] from metadata, or `None` for special files
fn to_entry(path: PathBuf, metadata: &Metadata) -> Option<LocalEntry> {
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else if metadata.is_file() {
        EntryKind::File
    } else {
        return None;
    };

    let modified = metadata
        .modified()
        .map(system_time_to_utc)
        .unwrap_or_default();
    let created = metadata
        .created()
        .map(system_time_to_utc)
        .unwrap_or(modified);
    let size = if kind == EntryKind::File {
        metadata.len()
    } else {
        0
    };

    Some(LocalEntry::new(path, kind, size, created, modified))
}

fn crc32_of(path: &Path) -> std::io::Result<u32> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHECKSUM_BLOCK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn entry(&self, path: &Path) -> anyhow::Result<Option<LocalEntry>> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(to_entry(path.to_path_buf(), &metadata))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;

        while let Some(item) = dir.next_entry().await? {
            if item.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                debug!(name = ?item.file_name(), "skipping partial download");
                continue;
            }
            let metadata = match item.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match to_entry(item.path(), &metadata) {
                Some(entry) => entries.push(entry),
                None => debug!(name = ?item.file_name(), "skipping special file"),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "directory listed");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_chunk(&self, path: &Path, offset: u64, len: usize) -> anyhow::Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut data = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut data).await?;
        Ok(data)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn checksum(&self, path: &Path) -> anyhow::Result<Crc32> {
        let owned = path.to_path_buf();
        let value = tokio::task::spawn_blocking(move || crc32_of(&owned)).await??;
        let crc = Crc32::new(value);
        debug!(crc = %crc, "checksum computed");
        Ok(crc)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        debug!("directory created");
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display(), modified = %modified))]
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
        let owned = path.to_path_buf();
        let time = std::time::SystemTime::from(modified);
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::options().write(true).open(&owned)?;
            file.set_modified(time)
        })
        .await??;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn delete(&self, path: &Path) -> anyhow::Result<bool> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("nothing to delete");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await?;
        }
        Ok(true)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
