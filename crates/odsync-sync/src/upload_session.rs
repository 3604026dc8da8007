//! Resumable upload of a large file
//!
//! ## Protocol
//!
//! ```text
//! Pending ──start──→ Active{offset: 0}
//! Active{offset} ──chunk accepted──→ Active{offset + len}
//! Active{offset} ──final chunk──→ Completed(entry)
//! Active{offset} ──chunk failed, attempts exhausted──→ Failed{sent: offset}
//! ```
//!
//! Chunks are read from the local file one at a time, so memory use is
//! bounded by the chunk size. A running CRC32 of everything sent lets the
//! caller verify the finalized item without reading the file again. The
//! remote session is left to expire on failure.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use tracing::{debug, info, warn};

use odsync_core::domain::{Crc32, RemoteEntry};
use odsync_core::ports::{
    ChunkOutcome, CloudError, ConflictBehavior, ICloudProvider, ILocalFileSystem,
    UploadSessionHandle,
};

use crate::retry::{with_retry, RetryPolicy};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Active { next_offset: u64 },
    Completed,
    /// Stopped with `sent` bytes confirmed by the service
    Failed { sent: u64 },
}

/// Chunked upload of one local file into one remote folder
pub struct UploadSession<'a> {
    cloud: &'a dyn ICloudProvider,
    fs: &'a dyn ILocalFileSystem,
    path: PathBuf,
    total: u64,
    chunk_size: u64,
    chunk_attempts: u32,
    retry: RetryPolicy,
    state: SessionState,
}

impl<'a> UploadSession<'a> {
    pub fn new(
        cloud: &'a dyn ICloudProvider,
        fs: &'a dyn ILocalFileSystem,
        path: PathBuf,
        total: u64,
        chunk_size: u64,
        chunk_attempts: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cloud,
            fs,
            path,
            total,
            chunk_size: chunk_size.max(1),
            chunk_attempts: chunk_attempts.max(1),
            retry,
            state: SessionState::Pending,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Uploads the whole file
    ///
    /// # Returns
    /// The finalized remote item and the CRC32 of the bytes that were sent
    ///
    /// # Errors
    /// Fails when the session cannot be started, a chunk fails more than the
    /// allowed number of times, or the service answers out of protocol.
    pub async fn run(
        &mut self,
        parent: &RemoteEntry,
        name: &str,
        conflict: ConflictBehavior,
    ) -> anyhow::Result<(RemoteEntry, Crc32)> {
        let result = self.drive(parent, name, conflict).await;
        if result.is_err() {
            let sent = match self.state {
                SessionState::Active { next_offset } => next_offset,
                _ => 0,
            };
            self.state = SessionState::Failed { sent };
        }
        result
    }

    async fn drive(
        &mut self,
        parent: &RemoteEntry,
        name: &str,
        conflict: ConflictBehavior,
    ) -> anyhow::Result<(RemoteEntry, Crc32)> {
        if self.total == 0 {
            bail!("Upload sessions need a non-empty file");
        }

        let session = with_retry(&self.retry, "start_upload_session", || {
            self.cloud
                .start_upload_session(parent, name, self.total, conflict)
        })
        .await
        .context("Failed to start upload session")?;

        debug!(name, total = self.total, chunk_size = self.chunk_size, "Upload session started");
        self.state = SessionState::Active { next_offset: 0 };

        let mut hasher = crc32fast::Hasher::new();
        let mut offset = 0u64;

        loop {
            let len = self.chunk_size.min(self.total - offset);
            let chunk = self
                .fs
                .read_chunk(&self.path, offset, len as usize)
                .await
                .with_context(|| format!("Failed to read {} at offset {offset}", self.path.display()))?;
            if chunk.len() as u64 != len {
                bail!(
                    "{} changed while uploading: expected {len} bytes at offset {offset}, read {}",
                    self.path.display(),
                    chunk.len()
                );
            }
            hasher.update(&chunk);

            let end = offset + len;
            match self.send_chunk(&session, offset, chunk).await? {
                ChunkOutcome::Accepted { next_offset } => {
                    if end >= self.total {
                        bail!("Service did not finalize the upload after the last chunk");
                    }
                    if next_offset != end {
                        bail!("Service expects offset {next_offset}, sent up to {end}");
                    }
                    offset = end;
                    self.state = SessionState::Active {
                        next_offset: offset,
                    };
                }
                ChunkOutcome::Completed(entry) => {
                    if end < self.total {
                        bail!("Service finalized the upload at {end} of {} bytes", self.total);
                    }
                    info!(name, bytes = self.total, "Upload session completed");
                    self.state = SessionState::Completed;
                    return Ok((entry, Crc32::new(hasher.finalize())));
                }
            }
        }
    }

    /// Sends one chunk, retrying it in place on failure
    async fn send_chunk(
        &self,
        session: &UploadSessionHandle,
        offset: u64,
        chunk: Vec<u8>,
    ) -> anyhow::Result<ChunkOutcome> {
        let mut attempt = 1;
        loop {
            match self
                .cloud
                .upload_chunk(session, offset, self.total, chunk.clone())
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(err) if retryable_chunk_error(&err) && attempt < self.chunk_attempts => {
                    let delay = self.retry.delay_for(attempt - 1, &err);
                    warn!(
                        offset,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Chunk upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(anyhow!(err).context(format!(
                        "Chunk at offset {offset} failed after {attempt} attempt(s)"
                    )))
                }
            }
        }
    }
}

/// Chunk failures worth repeating; anything else means the session is gone
fn retryable_chunk_error(err: &CloudError) -> bool {
    err.is_transient() || matches!(err, CloudError::Io(_))
}
