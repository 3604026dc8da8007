//! Upload operations for Microsoft Graph API (OneDrive)
//!
//! Provides the three endpoints the upload task drives:
//! - [`upload_small`] - Single-request upload for files under the simple-upload limit
//! - [`create_upload_session`] - Creates a resumable upload session
//! - [`upload_chunk`] - Uploads a single byte range within a session
//!
//! Chunk sequencing, per-chunk retry and verification live in the sync
//! engine; these functions perform exactly one HTTP exchange each.
//!
//! ## Microsoft Graph API References
//!
//! - [Upload small files](https://learn.microsoft.com/en-us/graph/api/driveitem-put-content)
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::debug;

use odsync_core::domain::entry::RemoteEntry;
use odsync_core::domain::newtypes::RemoteId;
use odsync_core::ports::cloud_provider::{
    ChunkOutcome, CloudError, ConflictBehavior, UploadSessionHandle,
};

use crate::client::{check_status, network_error, GraphClient};
use crate::items::{ChunkAcceptedResponse, GraphDriveItem, UploadSessionResponse};

// ============================================================================
// API path construction helper
// ============================================================================

/// Percent-encodes a file name for use inside a URL path
pub(crate) fn encode_name(name: &str) -> String {
    url::form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Builds the Graph API path addressing a child of a folder by name
///
/// Format: `/me/drive/items/{parent-id}:/{name}:/{suffix}`
///
/// # Arguments
/// * `parent_id` - Item ID of the parent folder
/// * `name` - File name (e.g., "file.txt")
/// * `suffix` - API operation suffix (e.g., "content" or "createUploadSession")
pub(crate) fn build_item_path(parent_id: &RemoteId, name: &str, suffix: &str) -> String {
    format!(
        "/me/drive/items/{}:/{}:/{}",
        parent_id.as_str(),
        encode_name(name),
        suffix
    )
}

// ============================================================================
// upload_small
// ============================================================================

/// Uploads a small file in a single PUT request
///
/// Uses the simple upload API:
/// `PUT /me/drive/items/{parent-id}:/{name}:/content?@microsoft.graph.conflictBehavior=...`
///
/// # Returns
/// The finalized [`RemoteEntry`] of the uploaded file
///
/// # Errors
/// [`CloudError::Conflict`] when `conflict` is `Fail` and the name exists
pub async fn upload_small(
    client: &GraphClient,
    parent: &RemoteEntry,
    name: &str,
    data: Vec<u8>,
    conflict: ConflictBehavior,
) -> Result<RemoteEntry, CloudError> {
    let path = format!(
        "{}?@microsoft.graph.conflictBehavior={}",
        build_item_path(&parent.id, name, "content"),
        conflict.as_str()
    );
    debug!(name, bytes = data.len(), path = %path, "Uploading small file");

    let item: GraphDriveItem = client
        .send(Method::PUT, &path, |r| {
            r.header("Content-Type", "application/octet-stream")
                .body(data.clone())
        })
        .await?
        .json()
        .await
        .map_err(network_error)?;

    debug!(id = %item.id, "Small upload completed");
    item.into_remote_entry()
}

// ============================================================================
// create_upload_session
// ============================================================================

/// Creates a resumable upload session
///
/// Uses `POST /me/drive/items/{parent-id}:/{name}:/createUploadSession`.
/// The returned URL accepts byte ranges without an Authorization header and
/// expires after a period of inactivity.
pub async fn create_upload_session(
    client: &GraphClient,
    parent: &RemoteEntry,
    name: &str,
    size: u64,
    conflict: ConflictBehavior,
) -> Result<UploadSessionHandle, CloudError> {
    let path = build_item_path(&parent.id, name, "createUploadSession");
    debug!(name, size, "Creating upload session");

    let body = json!({
        "item": {
            "@microsoft.graph.conflictBehavior": conflict.as_str(),
            "name": name,
        }
    });

    let response: UploadSessionResponse = client
        .send(Method::POST, &path, |r| r.json(&body))
        .await?
        .json()
        .await
        .map_err(network_error)?;

    debug!(expires = ?response.expiration_date_time, "Upload session created");
    Ok(UploadSessionHandle {
        upload_url: response.upload_url,
        expires_at: response.expiration_date_time,
    })
}

// ============================================================================
// upload_chunk
// ============================================================================

/// Uploads one byte range to an upload session
///
/// Sends a PUT to the session URL with a `Content-Range` header of
/// `bytes {offset}-{offset + len - 1}/{total}`.
///
/// # Returns
/// - [`ChunkOutcome::Accepted`] with the next expected offset (HTTP 202)
/// - [`ChunkOutcome::Completed`] with the finalized item (HTTP 200/201)
pub async fn upload_chunk(
    client: &GraphClient,
    session: &UploadSessionHandle,
    offset: u64,
    total: u64,
    data: Vec<u8>,
) -> Result<ChunkOutcome, CloudError> {
    let chunk_len = data.len() as u64;
    if chunk_len == 0 {
        return Err(CloudError::InvalidResponse(
            "refusing to send an empty chunk".to_string(),
        ));
    }
    let range_end = offset + chunk_len - 1;
    let content_range = format!("bytes {offset}-{range_end}/{total}");

    debug!(range = %content_range, bytes = chunk_len, "Uploading chunk");

    let response = client
        .http_client()
        .put(&session.upload_url)
        .header("Content-Length", chunk_len.to_string())
        .header("Content-Range", &content_range)
        .body(data)
        .send()
        .await
        .map_err(network_error)?;
    let response = check_status(response).await?;
    let status = response.status();

    if status == StatusCode::OK || status == StatusCode::CREATED {
        let item: GraphDriveItem = response.json().await.map_err(network_error)?;
        debug!(id = %item.id, "Upload session completed");
        return Ok(ChunkOutcome::Completed(item.into_remote_entry()?));
    }

    let accepted: ChunkAcceptedResponse = response.json().await.map_err(network_error)?;
    let next_offset = accepted.next_offset().unwrap_or(offset + chunk_len);
    debug!(next_offset, "Chunk accepted");
    Ok(ChunkOutcome::Accepted { next_offset })
}
