//! One-way synchronization engine
//!
//! The [`SyncEngine`] mirrors one tree onto the other: the local directory
//! onto a remote folder (upload direction) or the remote folder onto the
//! local directory (download direction).
//!
//! ## Run Flow
//!
//! 1. **Preconditions**: the remote root is a folder; the local root exists
//!    (upload) or is downloaded in full when absent (download)
//! 2. **Walk**: a DirectoryCheck for the two roots is enqueued; every task
//!    enqueues the work it discovers
//! 3. **Drain**: the engine waits until no task is pending or running, or
//!    until it is cancelled, then stops the workers and reports
//!
//! ## Retry Logic
//!
//! Transient remote errors are retried per call with capped exponential
//! backoff (see [`crate::retry`]). Upload chunks are retried in place, and a
//! transfer whose result fails verification is repeated as a whole.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use odsync_core::config::Config;
use odsync_core::domain::{ChangePolicy, RemoteEntry, SyncDirection};
use odsync_core::ports::{ICloudProvider, ILocalFileSystem};

use crate::context::SyncContext;
use crate::dry_run::{DryRunCloudProvider, DryRunFileSystem};
use crate::reporter::{Reporter, SyncSummary};
use crate::retry::RetryPolicy;
use crate::scheduler::{spawn_workers, TaskQueue};
use crate::tasks::Task;
use crate::SyncError;

// ============================================================================
// SyncOptions
// ============================================================================

/// Settings for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub direction: SyncDirection,
    /// Delete destination items missing on the source side
    pub mirror_deletes: bool,
    /// Log mutations instead of performing them
    pub dry_run: bool,
    /// Number of workers
    pub threads: usize,
    /// Files larger than this many bytes are skipped
    pub max_size: Option<u64>,
    /// Compare checksums even when size and dates match
    pub force_hash: bool,
    pub case_sensitive: bool,
    /// Files up to this many bytes are uploaded in one request
    pub simple_upload_max: u64,
    /// Upload session chunk size in bytes
    pub chunk_size: u64,
    /// Attempts per upload chunk
    pub chunk_attempts: u32,
    /// Attempts per transfer when verification fails
    pub transfer_attempts: u32,
    /// Retry policy for individual remote calls
    pub retry: RetryPolicy,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            direction: config.sync.direction,
            mirror_deletes: config.sync.mirror_deletes,
            dry_run: false,
            threads: config.sync.threads,
            max_size: config.max_size_bytes(),
            force_hash: config.sync.hash_compare,
            case_sensitive: config.sync.case_sensitive,
            simple_upload_max: config.simple_upload_max_bytes(),
            chunk_size: config.chunk_size_bytes(),
            chunk_attempts: config.transfer.chunk_attempts,
            transfer_attempts: config.transfer.upload_attempts,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    pub fn change_policy(&self) -> ChangePolicy {
        ChangePolicy {
            direction: self.direction,
            force_hash: self.force_hash,
            max_size: self.max_size,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// One-way synchronization engine
///
/// ## Dependencies
///
/// - `cloud`: Remote drive operations (listing, transfers, metadata)
/// - `fs`: Local file I/O, hashing and directory operations
///
/// In dry-run mode both are wrapped so that only reads reach them.
pub struct SyncEngine {
    cloud: Arc<dyn ICloudProvider>,
    fs: Arc<dyn ILocalFileSystem>,
    options: SyncOptions,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Creates a new `SyncEngine`
    ///
    /// # Arguments
    /// * `cloud` - Remote drive operations (ICloudProvider)
    /// * `fs` - Local file operations (ILocalFileSystem)
    /// * `options` - Settings for the run
    pub fn new(
        cloud: Arc<dyn ICloudProvider>,
        fs: Arc<dyn ILocalFileSystem>,
        options: SyncOptions,
    ) -> Self {
        let (cloud, fs): (Arc<dyn ICloudProvider>, Arc<dyn ILocalFileSystem>) = if options.dry_run
        {
            warn!("Dry run: no changes will be made on either side");
            (
                Arc::new(DryRunCloudProvider::new(cloud)),
                Arc::new(DryRunFileSystem::new(fs)),
            )
        } else {
            (cloud, fs)
        };

        Self {
            cloud,
            fs,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Token that stops the run when cancelled
    ///
    /// Tasks already running finish; nothing new is started.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validates the roots and picks the first task
    async fn first_task(&self, root: RemoteEntry, local: PathBuf) -> Result<Task> {
        if !root.is_directory {
            return Err(SyncError::RemoteRootNotFolder(root.name.clone()).into());
        }

        let entry = self
            .fs
            .entry(&local)
            .await
            .with_context(|| format!("Failed to inspect {}", local.display()))?;

        match (self.options.direction, entry) {
            (_, Some(e)) if e.is_directory() => Ok(Task::DirectoryCheck {
                remote: root,
                local,
            }),
            (_, Some(_)) => Err(SyncError::LocalRootNotDirectory(local).into()),
            (SyncDirection::Upload, None) => Err(SyncError::LocalRootMissing(local).into()),
            (SyncDirection::Download, None) => {
                info!(path = %local.display(), "Local root does not exist, downloading everything");
                Ok(Task::Download {
                    remote: root,
                    local,
                })
            }
        }
    }

    /// Synchronizes `local` with the remote folder `root`
    ///
    /// Individual task failures are logged and counted in the summary; they
    /// do not abort the run.
    ///
    /// # Errors
    /// Returns [`SyncError`] when a precondition fails before any task runs.
    #[tracing::instrument(skip(self, root, local), fields(remote = %root.name, local = %local.display()))]
    pub async fn run(&self, root: RemoteEntry, local: PathBuf) -> Result<SyncSummary> {
        let first = self.first_task(root, local).await?;

        info!(
            direction = %self.options.direction,
            threads = self.options.threads,
            mirror_deletes = self.options.mirror_deletes,
            dry_run = self.options.dry_run,
            "Starting sync"
        );

        let reporter = Arc::new(Reporter::new());
        let context = Arc::new(SyncContext::new(
            self.cloud.clone(),
            self.fs.clone(),
            self.options.clone(),
            reporter.clone(),
        ));
        let queue = Arc::new(TaskQueue::new());

        queue.enqueue(first);
        let workers = spawn_workers(queue.clone(), context, self.options.threads);

        let interrupted = tokio::select! {
            _ = queue.wait_for_completion() => false,
            _ = self.cancel.cancelled() => {
                warn!(outstanding = queue.outstanding(), "Sync interrupted");
                true
            }
        };

        queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Worker ended abnormally");
            }
        }

        let summary = reporter.summary(interrupted);
        reporter.log_summary(&summary);
        Ok(summary)
    }
}
