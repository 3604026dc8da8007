//! Change detection policy
//!
//! Pure decision logic for a single file present on both sides. The check
//! is split in two phases so the caller only hashes the local file when the
//! cheap metadata comparison cannot prove the files identical:
//!
//! 1. [`ChangeDetector::quick_check`] compares size and timestamps and applies
//!    the size threshold.
//! 2. [`ChangeDetector::resolve`] compares the local CRC32 with the remote hash,
//!    which is always the final arbiter before any bytes are transferred.
//!
//! [`ChangeDetector::decide`] chains both and awaits the checksum only when
//! the first phase asks for it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use super::entry::{LocalEntry, RemoteEntry};
use super::newtypes::Crc32;

/// Which side is the source of truth for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Local tree is pushed to the remote drive
    #[serde(alias = "up")]
    Upload,
    /// Remote drive is pulled into the local tree
    #[serde(alias = "down")]
    Download,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// Inputs to the change detection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePolicy {
    /// Sync direction; decides which side's size the threshold applies to
    /// and whether creation times take part in the comparison
    pub direction: SyncDirection,
    /// Always compare checksums, even when metadata matches
    pub force_hash: bool,
    /// Files larger than this many bytes are never transferred
    pub max_size: Option<u64>,
}

/// Outcome of the metadata-only phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickCheck {
    /// Size and timestamps match; no hashing needed
    Identical,
    /// The source file exceeds the configured threshold
    TooLarge { size: u64, limit: u64 },
    /// Metadata differs (or hashing is forced); compare checksums
    NeedsChecksum,
}

/// Final decision for one file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Nothing to do
    Unchanged,
    /// Source exceeds the size threshold; log and skip
    SkipTooLarge { size: u64, limit: u64 },
    /// Content differs; transfer the file
    TransferContent,
    /// Content is identical but dates differ; fix timestamps only
    UpdateDates,
}

/// Stateless change detector configured with a [`ChangePolicy`]
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    policy: ChangePolicy,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(policy: ChangePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ChangePolicy {
        &self.policy
    }

    /// True when the timestamps the direction can write are equal
    ///
    /// Local birth times cannot be set, so in download direction only the
    /// modification time is compared.
    #[must_use]
    pub fn dates_match(&self, remote: &RemoteEntry, local: &LocalEntry) -> bool {
        let modified_matches = remote.modified == local.modified;
        match self.policy.direction {
            SyncDirection::Upload => modified_matches && remote.created == local.created,
            SyncDirection::Download => modified_matches,
        }
    }

    /// Metadata-only comparison (steps 1 and 2 of the policy)
    #[must_use]
    pub fn quick_check(&self, remote: &RemoteEntry, local: &LocalEntry) -> QuickCheck {
        let size_matches = remote.size == local.size;

        if !self.policy.force_hash && size_matches && self.dates_match(remote, local) {
            return QuickCheck::Identical;
        }

        if let Some(limit) = self.policy.max_size {
            let size = match self.policy.direction {
                SyncDirection::Upload => local.size,
                SyncDirection::Download => remote.size,
            };
            if size > limit {
                return QuickCheck::TooLarge { size, limit };
            }
        }

        QuickCheck::NeedsChecksum
    }

    /// Checksum comparison (step 3 of the policy)
    ///
    /// A remote file without a reported hash cannot be confirmed identical
    /// and is treated as changed.
    #[must_use]
    pub fn resolve(
        &self,
        remote: &RemoteEntry,
        local: &LocalEntry,
        local_hash: Crc32,
    ) -> ChangeDecision {
        match remote.hash {
            Some(remote_hash) if remote_hash == local_hash => {
                if self.dates_match(remote, local) {
                    ChangeDecision::Unchanged
                } else {
                    ChangeDecision::UpdateDates
                }
            }
            _ => ChangeDecision::TransferContent,
        }
    }

    /// Runs both phases, hashing the local file only if required
    ///
    /// # Errors
    /// Propagates the error of `local_hash` when the checksum is needed
    pub async fn decide<E, F, Fut>(
        &self,
        remote: &RemoteEntry,
        local: &LocalEntry,
        local_hash: F,
    ) -> Result<ChangeDecision, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Crc32, E>>,
    {
        match self.quick_check(remote, local) {
            QuickCheck::Identical => Ok(ChangeDecision::Unchanged),
            QuickCheck::TooLarge { size, limit } => {
                Ok(ChangeDecision::SkipTooLarge { size, limit })
            }
            QuickCheck::NeedsChecksum => Ok(self.resolve(remote, local, local_hash().await?)),
        }
    }
}
