//! Remote and local entry metadata
//!
//! [`RemoteEntry`] and [`LocalEntry`] are the two halves every check task
//! binds together. Timestamps on both sides are held at second precision,
//! the precision OneDrive stores, so that equality comparisons between the
//! two sides are meaningful.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Crc32, RemoteId};

/// Truncates a timestamp to whole seconds
#[must_use]
pub fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// Converts a filesystem timestamp to a second-precision UTC timestamp
#[must_use]
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    truncate_to_seconds(DateTime::<Utc>::from(time))
}

// ============================================================================
// RemoteEntry
// ============================================================================

/// Metadata record for a file or folder in the remote drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider item ID
    pub id: RemoteId,
    /// File or folder name
    pub name: String,
    /// Parent folder ID (None for the drive root)
    pub parent_id: Option<RemoteId>,
    /// Whether the item is a folder
    pub is_directory: bool,
    /// Size in bytes (folders report the size of their contents)
    pub size: u64,
    /// CRC32 of the content, when the service reports one
    pub hash: Option<Crc32>,
    /// Creation time as recorded in the item's file system info
    pub created: DateTime<Utc>,
    /// Last modification time as recorded in the item's file system info
    pub modified: DateTime<Utc>,
}

impl RemoteEntry {
    /// Builds a file entry; timestamps are truncated to seconds
    #[must_use]
    pub fn file(
        id: RemoteId,
        name: impl Into<String>,
        parent_id: Option<RemoteId>,
        size: u64,
        hash: Option<Crc32>,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            is_directory: false,
            size,
            hash,
            created: truncate_to_seconds(created),
            modified: truncate_to_seconds(modified),
        }
    }

    /// Builds a folder entry; timestamps are truncated to seconds
    #[must_use]
    pub fn folder(
        id: RemoteId,
        name: impl Into<String>,
        parent_id: Option<RemoteId>,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            is_directory: true,
            size: 0,
            hash: None,
            created: truncate_to_seconds(created),
            modified: truncate_to_seconds(modified),
        }
    }
}

// ============================================================================
// LocalEntry
// ============================================================================

/// The kind of a local directory entry the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata record for a file or folder on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEntry {
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Creation (birth) time; falls back to `modified` where unavailable
    pub created: DateTime<Utc>,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl LocalEntry {
    /// Builds an entry; timestamps are truncated to seconds
    #[must_use]
    pub fn new(
        path: PathBuf,
        kind: EntryKind,
        size: u64,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            size,
            created: truncate_to_seconds(created),
            modified: truncate_to_seconds(modified),
        }
    }

    /// Returns true for directories
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Borrow the entry's path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
