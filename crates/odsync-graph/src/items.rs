//! DriveItem wire model
//!
//! Deserialization types for the JSON the Graph API returns for drive items,
//! children pages and upload sessions, plus their conversion into the
//! provider-agnostic [`RemoteEntry`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use odsync_core::domain::entry::RemoteEntry;
use odsync_core::domain::newtypes::{Crc32, RemoteId};
use odsync_core::ports::cloud_provider::{CloudError, DriveInfo};

// ============================================================================
// DriveItem
// ============================================================================

/// A DriveItem resource as returned by the Microsoft Graph API
///
/// Fields use `Option` because not all fields are present in every response
/// (folders lack file hashes, the root lacks a parent reference).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphDriveItem {
    pub id: String,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
    pub parent_reference: Option<ParentReference>,
    pub file: Option<FileFacet>,
    pub folder: Option<serde_json::Value>,
    pub file_system_info: Option<FileSystemInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParentReference {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileFacet {
    pub hashes: Option<FileHashes>,
}

/// Content hashes for a file
///
/// Personal drives report `crc32Hash`; business drives only report
/// `quickXorHash`, which the sync engine does not compare.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileHashes {
    pub crc32_hash: Option<String>,
}

/// Client-side timestamps stored on the item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileSystemInfo {
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

impl GraphDriveItem {
    /// Converts the wire item into a [`RemoteEntry`]
    ///
    /// `fileSystemInfo` timestamps win over the service timestamps because
    /// they are the ones the client sets.
    pub(crate) fn into_remote_entry(self) -> Result<RemoteEntry, CloudError> {
        let id = RemoteId::new(self.id)
            .map_err(|e| CloudError::InvalidResponse(format!("bad item id: {e}")))?;

        let parent_id = self
            .parent_reference
            .and_then(|p| p.id)
            .map(RemoteId::new)
            .transpose()
            .map_err(|e| CloudError::InvalidResponse(format!("bad parent id: {e}")))?;

        let (fs_created, fs_modified) = self
            .file_system_info
            .map(|fsi| (fsi.created_date_time, fsi.last_modified_date_time))
            .unwrap_or((None, None));

        let modified = fs_modified
            .or(self.last_modified_date_time)
            .unwrap_or_default();
        let created = fs_created.or(self.created_date_time).unwrap_or(modified);

        let name = self.name.unwrap_or_default();

        if self.folder.is_some() {
            return Ok(RemoteEntry::folder(id, name, parent_id, created, modified));
        }

        let hash = self
            .file
            .and_then(|f| f.hashes)
            .and_then(|h| h.crc32_hash)
            .and_then(|raw| match Crc32::from_le_hex(&raw) {
                Ok(crc) => Some(crc),
                Err(e) => {
                    warn!(item = %id, error = %e, "Ignoring unparseable crc32Hash");
                    None
                }
            });

        Ok(RemoteEntry::file(
            id,
            name,
            parent_id,
            self.size.unwrap_or(0),
            hash,
            created,
            modified,
        ))
    }
}

// ============================================================================
// Collections and sessions
// ============================================================================

/// One page of a children listing
#[derive(Debug, Deserialize)]
pub(crate) struct ChildrenPage {
    pub value: Vec<GraphDriveItem>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadSessionResponse {
    pub upload_url: String,
    pub expiration_date_time: Option<DateTime<Utc>>,
}

/// Response to an intermediate chunk (HTTP 202)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChunkAcceptedResponse {
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

impl ChunkAcceptedResponse {
    /// First byte of the first missing range ("12345-" or "12345-67890")
    pub(crate) fn next_offset(&self) -> Option<u64> {
        self.next_expected_ranges
            .first()
            .and_then(|range| range.split('-').next())
            .and_then(|start| start.trim().parse().ok())
    }
}

// ============================================================================
// Drive
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveResponse {
    pub id: String,
    pub drive_type: Option<String>,
    pub quota: Option<QuotaResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuotaResponse {
    pub total: Option<u64>,
    pub used: Option<u64>,
}

impl From<DriveResponse> for DriveInfo {
    fn from(drive: DriveResponse) -> Self {
        let (quota_used, quota_total) = drive
            .quota
            .map(|q| (q.used.unwrap_or(0), q.total.unwrap_or(0)))
            .unwrap_or((0, 0));
        Self {
            id: drive.id,
            drive_type: drive.drive_type.unwrap_or_else(|| "unknown".to_string()),
            quota_used,
            quota_total,
        }
    }
}
