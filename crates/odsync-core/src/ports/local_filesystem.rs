//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses for every local
//! read and write: directory listings, content access, CRC32 computation
//! and the few mutations a sync run performs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Entry timestamps are returned at second precision (see [`LocalEntry`]).
//! - Symlinks, sockets and other special files are not sync candidates and
//!   are left out of directory listings.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::entry::LocalEntry;
use crate::domain::newtypes::Crc32;

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - All paths are absolute.
/// - Writes that replace file content must be atomic (temp file + rename)
///   so an interrupted run never leaves a truncated file behind.
/// - Implementations must tolerate concurrent calls from several workers.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Gets the metadata of a file or directory
    ///
    /// # Returns
    /// `None` if the path does not exist
    async fn entry(&self, path: &Path) -> anyhow::Result<Option<LocalEntry>>;

    /// Lists the files and directories directly inside `path`
    ///
    /// # Errors
    /// Returns an error if the directory doesn't exist or cannot be read
    async fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>>;

    /// Reads the entire contents of a file
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Reads up to `len` bytes starting at `offset`
    ///
    /// # Returns
    /// Fewer than `len` bytes only when the end of the file is reached
    async fn read_chunk(&self, path: &Path, offset: u64, len: usize) -> anyhow::Result<Vec<u8>>;

    /// Computes the CRC32 of a file's content
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be read
    async fn checksum(&self, path: &Path) -> anyhow::Result<Crc32>;

    /// Creates a directory and all parent directories as needed
    async fn create_dir(&self, path: &Path) -> anyhow::Result<()>;

    /// Moves a file into place, replacing any existing file at `to`
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Sets the last modification time of a file
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()>;

    /// Deletes a file, or a directory with its contents
    ///
    /// # Returns
    /// `false` if nothing existed at `path`
    async fn delete(&self, path: &Path) -> anyhow::Result<bool>;
}
