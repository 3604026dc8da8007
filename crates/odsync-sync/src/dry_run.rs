//! Dry-run wrappers for both ports
//!
//! Reads pass through to the wrapped implementation so the walk sees the
//! real trees. Mutations only log what would have happened and return a
//! plausible result, which lets the engine run every task unchanged.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use odsync_core::domain::{Crc32, LocalEntry, RemoteEntry, RemoteId, RemotePath};
use odsync_core::ports::{
    ChunkOutcome, CloudError, ConflictBehavior, DriveInfo, ICloudProvider, ILocalFileSystem,
    UploadSessionHandle,
};

// ============================================================================
// DryRunCloudProvider
// ============================================================================

/// Cloud provider that never changes the remote drive
pub struct DryRunCloudProvider {
    inner: Arc<dyn ICloudProvider>,
    next_id: AtomicU64,
}

impl DryRunCloudProvider {
    pub fn new(inner: Arc<dyn ICloudProvider>) -> Self {
        Self {
            inner,
            next_id: AtomicU64::new(1),
        }
    }

    fn synthetic_id(&self) -> Result<RemoteId, CloudError> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        RemoteId::new(format!("dry-run-{n}")).map_err(|e| CloudError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ICloudProvider for DryRunCloudProvider {
    async fn drive_info(&self) -> Result<DriveInfo, CloudError> {
        self.inner.drive_info().await
    }

    async fn get_root(&self) -> Result<RemoteEntry, CloudError> {
        self.inner.get_root().await
    }

    async fn get_path(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError> {
        self.inner.get_path(path).await
    }

    async fn list_children(&self, folder: &RemoteEntry) -> Result<Vec<RemoteEntry>, CloudError> {
        self.inner.list_children(folder).await
    }

    async fn create_folder(
        &self,
        parent: &RemoteEntry,
        name: &str,
    ) -> Result<RemoteEntry, CloudError> {
        info!(parent = %parent.name, name, "[dry-run] Would create folder");
        let now = Utc::now();
        Ok(RemoteEntry::folder(
            self.synthetic_id()?,
            name,
            Some(parent.id.clone()),
            now,
            now,
        ))
    }

    async fn upload_file(
        &self,
        parent: &RemoteEntry,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteEntry, CloudError> {
        info!(
            parent = %parent.name,
            name,
            bytes = data.len(),
            conflict = conflict.as_str(),
            "[dry-run] Would upload file"
        );
        let now = Utc::now();
        Ok(RemoteEntry::file(
            self.synthetic_id()?,
            name,
            Some(parent.id.clone()),
            data.len() as u64,
            Some(Crc32::new(crc32fast::hash(&data))),
            now,
            now,
        ))
    }

    async fn start_upload_session(
        &self,
        parent: &RemoteEntry,
        name: &str,
        size: u64,
        _conflict: ConflictBehavior,
    ) -> Result<UploadSessionHandle, CloudError> {
        info!(parent = %parent.name, name, size, "[dry-run] Would start upload session");
        Ok(UploadSessionHandle {
            upload_url: format!("dry-run://{}/{}", parent.id, name),
            expires_at: None,
        })
    }

    async fn upload_chunk(
        &self,
        session: &UploadSessionHandle,
        offset: u64,
        total: u64,
        data: Vec<u8>,
    ) -> Result<ChunkOutcome, CloudError> {
        let next_offset = offset + data.len() as u64;
        if next_offset < total {
            return Ok(ChunkOutcome::Accepted { next_offset });
        }

        let name = session
            .upload_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let now = Utc::now();
        Ok(ChunkOutcome::Completed(RemoteEntry::file(
            self.synthetic_id()?,
            name,
            None,
            total,
            None,
            now,
            now,
        )))
    }

    async fn update_file_dates(
        &self,
        item: &RemoteEntry,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<RemoteEntry, CloudError> {
        info!(name = %item.name, %created, %modified, "[dry-run] Would update remote dates");
        let mut updated = item.clone();
        updated.created = created;
        updated.modified = modified;
        Ok(updated)
    }

    async fn download(&self, item: &RemoteEntry, target: &Path) -> Result<u64, CloudError> {
        info!(name = %item.name, target = %target.display(), "[dry-run] Would download file");
        Ok(item.size)
    }

    async fn delete(&self, item: &RemoteEntry) -> Result<(), CloudError> {
        info!(name = %item.name, id = %item.id, "[dry-run] Would delete remote item");
        Ok(())
    }
}

// ============================================================================
// DryRunFileSystem
// ============================================================================

/// Local filesystem that never changes the local tree
pub struct DryRunFileSystem {
    inner: Arc<dyn ILocalFileSystem>,
}

impl DryRunFileSystem {
    pub fn new(inner: Arc<dyn ILocalFileSystem>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl ILocalFileSystem for DryRunFileSystem {
    async fn entry(&self, path: &Path) -> anyhow::Result<Option<LocalEntry>> {
        self.inner.entry(path).await
    }

    async fn read_dir(&self, path: &Path) -> anyhow::Result<Vec<LocalEntry>> {
        self.inner.read_dir(path).await
    }

    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn read_chunk(&self, path: &Path, offset: u64, len: usize) -> anyhow::Result<Vec<u8>> {
        self.inner.read_chunk(path, offset, len).await
    }

    async fn checksum(&self, path: &Path) -> anyhow::Result<Crc32> {
        self.inner.checksum(path).await
    }

    async fn create_dir(&self, path: &Path) -> anyhow::Result<()> {
        info!(path = %path.display(), "[dry-run] Would create directory");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        info!(from = %from.display(), to = %to.display(), "[dry-run] Would move file");
        Ok(())
    }

    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
        info!(path = %path.display(), %modified, "[dry-run] Would set modification time");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> anyhow::Result<bool> {
        info!(path = %path.display(), "[dry-run] Would delete local item");
        Ok(true)
    }
}
