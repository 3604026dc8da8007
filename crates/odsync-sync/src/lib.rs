//! odsync Sync - One-way synchronization engine
//!
//! Provides:
//! - A priority task queue served by a fixed worker pool
//! - Change detection on size, timestamps and CRC32
//! - Chunked upload sessions with per-chunk retry
//! - Dry-run wrappers for both ports
//!
//! ## Modules
//!
//! - [`engine`] - Run orchestration and options
//! - [`scheduler`] - Task queue, worker pool and completion barrier
//! - [`tasks`] - The task variants and their bodies
//! - [`upload_session`] - Chunked upload protocol
//! - [`retry`] - Backoff and retry of remote calls
//! - [`reporter`] - Run statistics
//! - [`filesystem`] - Local filesystem adapter (tokio, CRC32)
//! - [`dry_run`] - Read-only wrappers for both ports

pub mod context;
pub mod dry_run;
pub mod engine;
pub mod filesystem;
pub mod reporter;
pub mod retry;
pub mod scheduler;
pub mod tasks;
pub mod upload_session;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{SyncEngine, SyncOptions};
pub use filesystem::LocalFileSystemAdapter;
pub use reporter::{readable_file_size, SyncSummary};

/// Conditions that prevent a run from starting
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote root resolved to a file
    #[error("Remote root is not a folder: {0}")]
    RemoteRootNotFolder(String),

    /// Upload direction needs an existing local root
    #[error("Local directory does not exist: {}", .0.display())]
    LocalRootMissing(PathBuf),

    /// The local root exists but is a file
    #[error("Local path is not a directory: {}", .0.display())]
    LocalRootNotDirectory(PathBuf),
}
