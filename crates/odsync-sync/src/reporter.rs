//! Run statistics
//!
//! Workers record outcomes on a shared [`Reporter`] as they go; the engine
//! turns it into a [`SyncSummary`] once the queue drains.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

/// Formats a byte count with a binary unit, e.g. `1.5 MB`
pub fn readable_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Final statistics of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub files_uploaded: u64,
    pub bytes_uploaded: u64,
    pub files_downloaded: u64,
    pub bytes_downloaded: u64,
    pub folders_created: u64,
    pub metadata_updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    /// The run was stopped before the queue drained
    pub interrupted: bool,
    pub duration_ms: u64,
}

impl SyncSummary {
    /// Number of files moved in either direction
    pub fn files_transferred(&self) -> u64 {
        self.files_uploaded + self.files_downloaded
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_uploaded + self.bytes_downloaded
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

/// Thread-safe counters shared by all workers
#[derive(Debug)]
pub struct Reporter {
    started: Instant,
    files_uploaded: AtomicU64,
    bytes_uploaded: AtomicU64,
    files_downloaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    folders_created: AtomicU64,
    metadata_updated: AtomicU64,
    deleted: AtomicU64,
    unchanged: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            files_uploaded: AtomicU64::new(0),
            bytes_uploaded: AtomicU64::new(0),
            files_downloaded: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            folders_created: AtomicU64::new(0),
            metadata_updated: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn uploaded(&self, bytes: u64) {
        self.files_uploaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn downloaded(&self, bytes: u64) {
        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn folder_created(&self) {
        self.folders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metadata_updated(&self) {
        self.metadata_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn summary(&self, interrupted: bool) -> SyncSummary {
        SyncSummary {
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            folders_created: self.folders_created.load(Ordering::Relaxed),
            metadata_updated: self.metadata_updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            interrupted,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Logs the summary at info level
    pub fn log_summary(&self, summary: &SyncSummary) {
        info!(
            files_transferred = summary.files_transferred(),
            bytes = %readable_file_size(summary.bytes_transferred()),
            folders_created = summary.folders_created,
            metadata_updated = summary.metadata_updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            duration_ms = summary.duration_ms,
            "Sync finished"
        );
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
