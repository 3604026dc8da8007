//! UpdateMetadata and Delete bodies

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::{Target, Task};
use crate::context::{Queue, SyncContext};
use crate::retry::with_retry;

impl SyncContext {
    #[instrument(skip(self, target, created), fields(target = %target))]
    pub(crate) async fn update_metadata(
        &self,
        target: Target,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        match target {
            Target::Remote(item) => {
                with_retry(&self.options.retry, "update_file_dates", || {
                    self.cloud.update_file_dates(&item, created, modified)
                })
                .await
                .with_context(|| format!("Failed to update dates of {}", item.name))?;
            }
            Target::Local(path) => {
                self.fs
                    .set_modified(&path, modified)
                    .await
                    .with_context(|| format!("Failed to set modification time of {}", path.display()))?;
            }
        }

        debug!("Dates updated");
        self.reporter.metadata_updated();
        Ok(())
    }

    #[instrument(skip(self, target, then, queue), fields(target = %target))]
    pub(crate) async fn delete(
        &self,
        target: Target,
        then: Option<Box<Task>>,
        queue: &Queue,
    ) -> anyhow::Result<()> {
        match target {
            Target::Remote(item) => {
                let deleted = with_retry(&self.options.retry, "delete", || self.cloud.delete(&item)).await;
                match deleted {
                    Ok(()) => {
                        info!("Deleted remote item");
                        self.reporter.deleted();
                    }
                    Err(err) if err.is_not_found() => debug!("Remote item already gone"),
                    Err(err) => {
                        return Err(err).with_context(|| format!("Failed to delete remote {}", item.name))
                    }
                }
            }
            Target::Local(path) => {
                let existed = self
                    .fs
                    .delete(&path)
                    .await
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
                if existed {
                    info!("Deleted local item");
                    self.reporter.deleted();
                } else {
                    debug!("Local item already gone");
                }
            }
        }

        if let Some(next) = then {
            queue.enqueue(*next);
        }
        Ok(())
    }
}
