//! DirectoryCheck and FileCheck bodies

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info, instrument, trace, warn};

use odsync_core::domain::{ChangeDecision, LocalEntry, RemoteEntry, SyncDirection};

use super::{Target, Task};
use crate::context::{Queue, SyncContext};
use crate::reporter::readable_file_size;
use crate::retry::with_retry;

impl SyncContext {
    /// Size limit exceeded by a file of `size` bytes, if any
    pub(crate) fn exceeded_limit(&self, size: u64) -> Option<u64> {
        self.options.max_size.filter(|limit| size > *limit)
    }

    fn skip_too_large(&self, name: &str, size: u64, limit: u64) {
        info!(
            name,
            size = %readable_file_size(size),
            limit = %readable_file_size(limit),
            "Skipping file larger than the size limit"
        );
        self.reporter.skipped();
    }

    /// Indexes local entries by match key
    ///
    /// With case-insensitive matching two local names can share a key; the
    /// first in name order is kept and the other is skipped.
    pub(super) fn index_local(&self, entries: Vec<LocalEntry>) -> HashMap<String, LocalEntry> {
        let mut index: HashMap<String, LocalEntry> = HashMap::with_capacity(entries.len());
        for entry in entries {
            match index.entry(self.match_key(&entry.name)) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(kept) => {
                    warn!(
                        path = %entry.path.display(),
                        kept = %kept.get().name,
                        "Name differs only in case from another entry, skipping"
                    );
                    self.reporter.skipped();
                }
            }
        }
        index
    }

    #[instrument(skip(self, remote, local, queue), fields(remote = %remote.name, local = %local.display()))]
    pub(crate) async fn check_directory(
        &self,
        remote: RemoteEntry,
        local: PathBuf,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        let remote_children = with_retry(&self.options.retry, "list_children", || {
            self.cloud.list_children(&remote)
        })
        .await
        .with_context(|| format!("Failed to list remote folder {}", remote.name))?;

        let local_children = self
            .fs
            .read_dir(&local)
            .await
            .with_context(|| format!("Local directory not accessible, skipping {}", local.display()))?;

        debug!(
            remote_count = remote_children.len(),
            local_count = local_children.len(),
            "Comparing directory"
        );

        let mut unmatched = self.index_local(local_children);

        for child in remote_children {
            match unmatched.remove(&self.match_key(&child.name)) {
                Some(local_child) => self.pair(&remote, child, local_child, queue),
                None => {
                    let path = local.join(&child.name);
                    self.remote_only(child, path, queue);
                }
            }
        }

        let mut local_only: Vec<LocalEntry> = unmatched.into_values().collect();
        local_only.sort_by(|a, b| a.name.cmp(&b.name));
        for entry in local_only {
            self.local_only(&remote, entry, queue);
        }

        Ok(())
    }

    /// An entry present on both sides under the same name
    fn pair(&self, parent: &RemoteEntry, remote: RemoteEntry, local: LocalEntry, queue: &Queue) {
        match (remote.is_directory, local.is_directory()) {
            (true, true) => queue.enqueue(Task::DirectoryCheck {
                remote,
                local: local.path,
            }),
            (false, false) => queue.enqueue(Task::FileCheck {
                parent: parent.clone(),
                remote,
                local,
            }),
            _ => {
                info!(
                    name = %local.name,
                    remote_is_directory = remote.is_directory,
                    "File and folder share a name, replacing destination"
                );
                let task = match self.options.direction {
                    SyncDirection::Upload => Task::Delete {
                        target: Target::Remote(remote),
                        then: Some(Box::new(Task::upload_new(parent, local))),
                    },
                    SyncDirection::Download => Task::Delete {
                        target: Target::Local(local.path.clone()),
                        then: Some(Box::new(Task::Download {
                            remote,
                            local: local.path,
                        })),
                    },
                };
                queue.enqueue(task);
            }
        }
    }

    pub(super) fn remote_only(&self, remote: RemoteEntry, path: PathBuf, queue: &Queue) {
        match self.options.direction {
            SyncDirection::Download => {
                if !remote.is_directory {
                    if let Some(limit) = self.exceeded_limit(remote.size) {
                        self.skip_too_large(&remote.name, remote.size, limit);
                        return;
                    }
                }
                queue.enqueue(Task::Download {
                    remote,
                    local: path,
                });
            }
            SyncDirection::Upload if self.options.mirror_deletes => queue.enqueue(Task::Delete {
                target: Target::Remote(remote),
                then: None,
            }),
            SyncDirection::Upload => {
                debug!(name = %remote.name, "Remote-only item left in place");
            }
        }
    }

    pub(super) fn local_only(&self, parent: &RemoteEntry, local: LocalEntry, queue: &Queue) {
        match self.options.direction {
            SyncDirection::Upload => {
                if !local.is_directory() {
                    if let Some(limit) = self.exceeded_limit(local.size) {
                        self.skip_too_large(&local.name, local.size, limit);
                        return;
                    }
                }
                queue.enqueue(Task::upload_new(parent, local));
            }
            SyncDirection::Download if self.options.mirror_deletes => {
                queue.enqueue(Task::Delete {
                    target: Target::Local(local.path),
                    then: None,
                });
            }
            SyncDirection::Download => {
                debug!(path = %local.path.display(), "Local-only item left in place");
            }
        }
    }

    #[instrument(skip(self, parent, remote, local, queue), fields(path = %local.path.display()))]
    pub(crate) async fn check_file(
        &self,
        parent: RemoteEntry,
        remote: RemoteEntry,
        local: LocalEntry,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        let (fs, path) = (&self.fs, &local.path);
        let decision = self
            .detector
            .decide(&remote, &local, move || async move {
                fs.checksum(path)
                    .await
                    .with_context(|| format!("Unable to compare file {}", path.display()))
            })
            .await?;

        match decision {
            ChangeDecision::Unchanged => {
                trace!("File unchanged");
                self.reporter.unchanged();
            }
            ChangeDecision::SkipTooLarge { size, limit } => {
                self.skip_too_large(&local.name, size, limit);
            }
            ChangeDecision::TransferContent => {
                debug!(direction = %self.options.direction, "Content differs");
                match self.options.direction {
                    SyncDirection::Upload => queue.enqueue(Task::Upload {
                        parent,
                        local,
                        replace: true,
                    }),
                    SyncDirection::Download => queue.enqueue(Task::Download {
                        remote,
                        local: local.path,
                    }),
                }
            }
            ChangeDecision::UpdateDates => {
                debug!("Content identical, dates differ");
                let task = match self.options.direction {
                    SyncDirection::Upload => Task::UpdateMetadata {
                        target: Target::Remote(remote),
                        created: local.created,
                        modified: local.modified,
                    },
                    SyncDirection::Download => Task::UpdateMetadata {
                        target: Target::Local(local.path),
                        created: remote.created,
                        modified: remote.modified,
                    },
                };
                queue.enqueue(task);
            }
        }

        Ok(())
    }
}
