//! Upload, CreateFolder and Download bodies

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{debug, info, instrument, warn};

use odsync_core::domain::{Crc32, LocalEntry, RemoteEntry};
use odsync_core::ports::ConflictBehavior;

use super::{Target, Task};
use crate::context::{Queue, SyncContext};
use crate::filesystem::PARTIAL_SUFFIX;
use crate::reporter::readable_file_size;
use crate::retry::with_retry;
use crate::upload_session::{SessionState, UploadSession};

/// Checks the item the service reports against what was sent
fn verify_upload(uploaded: &RemoteEntry, sent_len: u64, sent_crc: Crc32) -> Result<(), String> {
    if uploaded.size != sent_len {
        return Err(format!(
            "size mismatch: sent {sent_len} bytes, remote reports {}",
            uploaded.size
        ));
    }
    match uploaded.hash {
        Some(remote) if remote != sent_crc => Err(format!(
            "checksum mismatch: sent {sent_crc}, remote reports {remote}"
        )),
        _ => Ok(()),
    }
}

/// Temporary sibling a download is written to before it is moved into place
fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}{PARTIAL_SUFFIX}"))
}

impl SyncContext {
    #[instrument(
        skip(self, parent, local, queue),
        fields(path = %local.path.display(), size = local.size)
    )]
    pub(crate) async fn upload(
        &self,
        parent: RemoteEntry,
        local: LocalEntry,
        replace: bool,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        let attempts = self.options.transfer_attempts.max(1);

        for attempt in 1..=attempts {
            // A repeated attempt overwrites the item the failed one left behind
            let conflict = if replace || attempt > 1 {
                ConflictBehavior::Replace
            } else {
                ConflictBehavior::Fail
            };
            let (uploaded, sent_len, sent_crc) = if local.size <= self.options.simple_upload_max {
                let data = self
                    .fs
                    .read_file(&local.path)
                    .await
                    .with_context(|| format!("Failed to read {}", local.path.display()))?;
                let sent_len = data.len() as u64;
                let sent_crc = Crc32::new(crc32fast::hash(&data));

                let entry = with_retry(&self.options.retry, "upload_file", || {
                    self.cloud
                        .upload_file(&parent, &local.name, data.clone(), conflict)
                })
                .await
                .with_context(|| format!("Failed to upload {}", local.path.display()))?;
                (entry, sent_len, sent_crc)
            } else {
                let mut session = UploadSession::new(
                    self.cloud.as_ref(),
                    self.fs.as_ref(),
                    local.path.clone(),
                    local.size,
                    self.options.chunk_size,
                    self.options.chunk_attempts,
                    self.options.retry,
                );
                let result = session.run(&parent, &local.name, conflict).await;
                if let SessionState::Failed { sent } = session.state() {
                    warn!(
                        sent = %readable_file_size(*sent),
                        total = %readable_file_size(local.size),
                        "Upload session abandoned"
                    );
                }
                let (entry, sent_crc) =
                    result.with_context(|| format!("Failed to upload {}", local.path.display()))?;
                (entry, local.size, sent_crc)
            };

            match verify_upload(&uploaded, sent_len, sent_crc) {
                Ok(()) => {
                    info!(bytes = %readable_file_size(sent_len), "Uploaded file");
                    self.reporter.uploaded(sent_len);

                    if !self.detector.dates_match(&uploaded, &local) {
                        queue.enqueue(Task::UpdateMetadata {
                            target: Target::Remote(uploaded),
                            created: local.created,
                            modified: local.modified,
                        });
                    }
                    return Ok(());
                }
                Err(reason) => {
                    warn!(attempt, attempts, reason = %reason, "Upload verification failed");
                }
            }
        }

        bail!(
            "Upload of {} failed verification after {attempts} attempt(s)",
            local.path.display()
        )
    }

    #[instrument(skip(self, parent, local, queue), fields(parent = %parent.name, name = %local.name))]
    pub(crate) async fn create_folder(
        &self,
        parent: RemoteEntry,
        local: LocalEntry,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        let created = with_retry(&self.options.retry, "create_folder", || {
            self.cloud.create_folder(&parent, &local.name)
        })
        .await;

        match created {
            Ok(folder) => {
                info!("Created remote folder");
                self.reporter.folder_created();

                let children = self
                    .fs
                    .read_dir(&local.path)
                    .await
                    .with_context(|| format!("Local directory not accessible, skipping {}", local.path.display()))?;
                let mut children: Vec<LocalEntry> =
                    self.index_local(children).into_values().collect();
                children.sort_by(|a, b| a.name.cmp(&b.name));
                for child in children {
                    self.local_only(&folder, child, queue);
                }
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                let existing = self.find_folder(&parent, &local.name).await?;
                debug!(id = %existing.id, "Folder already exists, comparing contents");
                queue.enqueue(Task::DirectoryCheck {
                    remote: existing,
                    local: local.path,
                });
                Ok(())
            }
            Err(err) => Err(err)
                .with_context(|| format!("Failed to create folder {}/{}", parent.name, local.name)),
        }
    }

    /// Resolves a child folder of `parent` by name
    ///
    /// The drive compares names without regard to case, so an exact match is
    /// preferred and a case-insensitive one accepted.
    async fn find_folder(&self, parent: &RemoteEntry, name: &str) -> anyhow::Result<RemoteEntry> {
        let children = with_retry(&self.options.retry, "list_children", || {
            self.cloud.list_children(parent)
        })
        .await
        .with_context(|| format!("Failed to list remote folder {}", parent.name))?;

        let folders: Vec<RemoteEntry> = children.into_iter().filter(|c| c.is_directory).collect();
        let lowered = name.to_lowercase();
        folders
            .iter()
            .find(|c| c.name == name)
            .or_else(|| folders.iter().find(|c| c.name.to_lowercase() == lowered))
            .cloned()
            .with_context(|| format!("Folder {}/{name} reported as existing but not found", parent.name))
    }

    #[instrument(skip(self, remote, local, queue), fields(name = %remote.name, local = %local.display()))]
    pub(crate) async fn download(
        &self,
        remote: RemoteEntry,
        local: PathBuf,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        if remote.is_directory {
            return self.download_folder(remote, local, queue).await;
        }

        if self.options.dry_run {
            self.cloud.download(&remote, &local).await?;
            self.reporter.downloaded(remote.size);
            return Ok(());
        }

        let partial = partial_path(&local);
        let attempts = self.options.transfer_attempts.max(1);

        for attempt in 1..=attempts {
            let written = match with_retry(&self.options.retry, "download", || {
                self.cloud.download(&remote, &partial)
            })
            .await
            {
                Ok(written) => written,
                Err(err) => {
                    self.discard_partial(&partial).await;
                    return Err(err)
                        .with_context(|| format!("Failed to download {}", remote.name));
                }
            };

            match self.verify_download(&remote, &partial, written).await {
                Ok(()) => {
                    if let Err(err) = self.move_into_place(&partial, &local, &remote).await {
                        self.discard_partial(&partial).await;
                        return Err(err);
                    }
                    info!(bytes = %readable_file_size(written), "Downloaded file");
                    self.reporter.downloaded(written);
                    return Ok(());
                }
                Err(reason) => {
                    warn!(attempt, attempts, reason = %reason, "Download verification failed");
                    self.discard_partial(&partial).await;
                }
            }
        }

        bail!(
            "Download of {} failed verification after {attempts} attempt(s)",
            remote.name
        )
    }

    async fn download_folder(
        &self,
        remote: RemoteEntry,
        local: PathBuf,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        self.fs
            .create_dir(&local)
            .await
            .with_context(|| format!("Failed to create directory {}", local.display()))?;
        self.reporter.folder_created();

        let children = with_retry(&self.options.retry, "list_children", || {
            self.cloud.list_children(&remote)
        })
        .await
        .with_context(|| format!("Failed to list remote folder {}", remote.name))?;

        for child in children {
            let path = local.join(&child.name);
            self.remote_only(child, path, queue);
        }
        Ok(())
    }

    async fn verify_download(
        &self,
        remote: &RemoteEntry,
        partial: &Path,
        written: u64,
    ) -> Result<(), String> {
        if written != remote.size {
            return Err(format!(
                "size mismatch: expected {} bytes, received {written}",
                remote.size
            ));
        }
        if let Some(expected) = remote.hash {
            let actual = self
                .fs
                .checksum(partial)
                .await
                .map_err(|e| format!("checksum failed: {e:#}"))?;
            if actual != expected {
                return Err(format!(
                    "checksum mismatch: expected {expected}, received {actual}"
                ));
            }
        }
        Ok(())
    }

    async fn move_into_place(
        &self,
        partial: &Path,
        local: &Path,
        remote: &RemoteEntry,
    ) -> anyhow::Result<()> {
        self.fs
            .set_modified(partial, remote.modified)
            .await
            .with_context(|| format!("Failed to set dates on {}", partial.display()))?;
        self.fs
            .rename(partial, local)
            .await
            .with_context(|| format!("Failed to move download into {}", local.display()))
    }

    async fn discard_partial(&self, partial: &Path) {
        if let Err(e) = self.fs.delete(partial).await {
            warn!(path = %partial.display(), error = %e, "Failed to remove partial download");
        }
    }
}
