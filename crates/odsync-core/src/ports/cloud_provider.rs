//! Cloud provider port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to talk to the
//! remote drive. The primary implementation targets Microsoft OneDrive via
//! the Microsoft Graph API.
//!
//! ## Design Notes
//!
//! - Unlike the filesystem port, calls fail with the typed [`CloudError`]
//!   rather than `anyhow::Error`: the engine's retry and idempotency rules
//!   depend on the error class (rate limited, not found, conflict, ...).
//! - Expired access tokens are refreshed inside the adapter; the engine never
//!   sees an authentication failure unless the refresh itself failed.
//! - Uses `#[async_trait]` for async trait methods.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entry::RemoteEntry;
use crate::domain::newtypes::RemotePath;

// ============================================================================
// CloudError
// ============================================================================

/// Errors returned by every [`ICloudProvider`] call
#[derive(Debug, Error)]
pub enum CloudError {
    /// Authentication failed and could not be refreshed (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429 / 509); retry after the given delay if known
    #[error("Too many requests, retry after {retry_after:?}")]
    RateLimited {
        /// Server-provided delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (HTTP 5xx)
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The requested item does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item already exists or was changed concurrently (HTTP 409 / 412)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other client-side rejection (HTTP 4xx)
    #[error("Client error {status}: {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed or was inconsistent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local I/O failure while reading or writing transferred content
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    /// Maps an HTTP status code and body to the matching error class
    ///
    /// Successful statuses are not errors; callers only pass failures.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 | 412 => Self::Conflict(message),
            429 | 509 => Self::RateLimited { retry_after },
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Rate limiting, server errors and network failures are transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    /// Server-requested delay, if any
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens used to authenticate against the cloud provider
///
/// Contains the access token for API requests, an optional refresh token
/// for obtaining new access tokens, and the expiration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    /// (requires `offline_access` scope)
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// DriveInfo
// ============================================================================

/// Summary of the drive the client is connected to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveInfo {
    /// Drive identifier
    pub id: String,
    /// "personal", "business" or "documentLibrary"
    pub drive_type: String,
    /// Storage quota used in bytes
    pub quota_used: u64,
    /// Total storage quota in bytes
    pub quota_total: u64,
}

// ============================================================================
// Upload session types
// ============================================================================

/// What to do when an uploaded name already exists in the parent folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictBehavior {
    /// Overwrite the existing item's content
    Replace,
    /// Reject the upload with [`CloudError::Conflict`]
    Fail,
}

impl ConflictBehavior {
    /// Wire value of the `@microsoft.graph.conflictBehavior` annotation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Fail => "fail",
        }
    }
}

/// Server-negotiated handle for a chunked upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSessionHandle {
    /// Pre-authenticated URL that receives the byte ranges
    pub upload_url: String,
    /// When the server will discard the session
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of submitting one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More bytes are expected, starting at `next_offset`
    Accepted {
        /// First byte the server expects next
        next_offset: u64,
    },
    /// The last byte arrived; the server returned the finalized item
    Completed(RemoteEntry),
}

// ============================================================================
// ICloudProvider trait
// ============================================================================

/// Port trait for remote drive operations
///
/// ## Implementation Notes
///
/// - Implementations must not retry rate-limited or server errors on their
///   own; the engine retries at the call site with its own backoff policy.
/// - Token refresh on HTTP 401 is the implementation's responsibility and
///   happens at most once per call.
#[async_trait::async_trait]
pub trait ICloudProvider: Send + Sync {
    /// Returns metadata about the connected drive
    async fn drive_info(&self) -> Result<DriveInfo, CloudError>;

    /// Returns the drive's root folder
    async fn get_root(&self) -> Result<RemoteEntry, CloudError>;

    /// Resolves an item by its path from the drive root
    async fn get_path(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError>;

    /// Lists every child of a folder (all pages)
    async fn list_children(&self, folder: &RemoteEntry) -> Result<Vec<RemoteEntry>, CloudError>;

    /// Creates a folder; fails with [`CloudError::Conflict`] if the name exists
    async fn create_folder(&self, parent: &RemoteEntry, name: &str)
        -> Result<RemoteEntry, CloudError>;

    /// Uploads a file in a single request
    async fn upload_file(
        &self,
        parent: &RemoteEntry,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteEntry, CloudError>;

    /// Starts a resumable upload session for a file of `size` bytes
    async fn start_upload_session(
        &self,
        parent: &RemoteEntry,
        name: &str,
        size: u64,
        conflict: ConflictBehavior,
    ) -> Result<UploadSessionHandle, CloudError>;

    /// Sends the bytes `[offset, offset + data.len())` of a `total`-byte file
    async fn upload_chunk(
        &self,
        session: &UploadSessionHandle,
        offset: u64,
        total: u64,
        data: Vec<u8>,
    ) -> Result<ChunkOutcome, CloudError>;

    /// Sets the created/modified timestamps stored on an item
    async fn update_file_dates(
        &self,
        item: &RemoteEntry,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<RemoteEntry, CloudError>;

    /// Downloads a file's content into `target`, returning the bytes written
    async fn download(&self, item: &RemoteEntry, target: &Path) -> Result<u64, CloudError>;

    /// Deletes an item (folders are deleted with their contents)
    async fn delete(&self, item: &RemoteEntry) -> Result<(), CloudError>;
}
