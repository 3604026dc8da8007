//! GraphCloudProvider - ICloudProvider implementation for Microsoft Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the upload module and direct
//! item endpoints to fulfil the [`ICloudProvider`] port contract.
//!
//! ## Design Notes
//!
//! - Token refresh is handled inside [`GraphClient::send`]; the provider
//!   never sees a 401 unless the refresh itself failed.
//! - No call is retried here: the sync engine owns the retry policy.
//! - Children listings follow `@odata.nextLink` until the last page.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use odsync_core::domain::entry::RemoteEntry;
use odsync_core::domain::newtypes::RemotePath;
use odsync_core::ports::cloud_provider::{
    ChunkOutcome, CloudError, ConflictBehavior, DriveInfo, ICloudProvider, UploadSessionHandle,
};

use crate::client::{network_error, GraphClient};
use crate::items::{ChildrenPage, GraphDriveItem};
use crate::upload::{self, encode_name};

/// Page size requested for children listings
const CHILDREN_PAGE_SIZE: u32 = 200;

/// Builds `/me/drive/root:{path}` with each component percent-encoded
fn build_path_lookup(path: &RemotePath) -> String {
    let encoded: Vec<String> = path
        .as_str()
        .split('/')
        .filter(|c| !c.is_empty())
        .map(encode_name)
        .collect();
    format!("/me/drive/root:/{}", encoded.join("/"))
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// GraphCloudProvider
// ============================================================================

/// Cloud provider implementation that delegates to the Microsoft Graph API
#[derive(Debug, Clone)]
pub struct GraphCloudProvider {
    client: GraphClient,
}

impl GraphCloudProvider {
    /// Creates a new `GraphCloudProvider` wrapping the given [`GraphClient`]
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Returns the wrapped client
    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    async fn get_item(&self, path: &str) -> Result<RemoteEntry, CloudError> {
        let item: GraphDriveItem = self.client.get_json(path).await?;
        item.into_remote_entry()
    }
}

#[async_trait::async_trait]
impl ICloudProvider for GraphCloudProvider {
    async fn drive_info(&self) -> Result<DriveInfo, CloudError> {
        self.client.get_drive_info().await
    }

    async fn get_root(&self) -> Result<RemoteEntry, CloudError> {
        debug!("GraphCloudProvider::get_root");
        self.get_item("/me/drive/root").await
    }

    /// Resolves an item by path via `GET /me/drive/root:{path}`
    async fn get_path(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError> {
        if path.is_root() {
            return self.get_root().await;
        }
        debug!(path = %path, "GraphCloudProvider::get_path");
        self.get_item(&build_path_lookup(path)).await
    }

    /// Lists a folder via `GET /me/drive/items/{id}/children`, all pages
    async fn list_children(&self, folder: &RemoteEntry) -> Result<Vec<RemoteEntry>, CloudError> {
        let mut next = Some(format!(
            "/me/drive/items/{}/children?$top={CHILDREN_PAGE_SIZE}",
            folder.id.as_str()
        ));
        let mut children = Vec::new();
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            let page: ChildrenPage = self.client.get_json(&url).await?;
            pages += 1;
            for item in page.value {
                children.push(item.into_remote_entry()?);
            }
            next = page.next_link;
        }

        debug!(folder = %folder.id, children = children.len(), pages, "Listed children");
        Ok(children)
    }

    /// Creates a folder via `POST /me/drive/items/{parent-id}/children`
    async fn create_folder(
        &self,
        parent: &RemoteEntry,
        name: &str,
    ) -> Result<RemoteEntry, CloudError> {
        let path = format!("/me/drive/items/{}/children", parent.id.as_str());
        let body = json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });
        debug!(parent = %parent.id, name, "GraphCloudProvider::create_folder");

        let item: GraphDriveItem = self
            .client
            .send(Method::POST, &path, |r| r.json(&body))
            .await?
            .json()
            .await
            .map_err(network_error)?;
        item.into_remote_entry()
    }

    async fn upload_file(
        &self,
        parent: &RemoteEntry,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteEntry, CloudError> {
        upload::upload_small(&self.client, parent, name, data, conflict).await
    }

    async fn start_upload_session(
        &self,
        parent: &RemoteEntry,
        name: &str,
        size: u64,
        conflict: ConflictBehavior,
    ) -> Result<UploadSessionHandle, CloudError> {
        upload::create_upload_session(&self.client, parent, name, size, conflict).await
    }

    async fn upload_chunk(
        &self,
        session: &UploadSessionHandle,
        offset: u64,
        total: u64,
        data: Vec<u8>,
    ) -> Result<ChunkOutcome, CloudError> {
        upload::upload_chunk(&self.client, session, offset, total, data).await
    }

    /// Writes `fileSystemInfo` via `PATCH /me/drive/items/{id}`
    async fn update_file_dates(
        &self,
        item: &RemoteEntry,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<RemoteEntry, CloudError> {
        let path = format!("/me/drive/items/{}", item.id.as_str());
        let body = json!({
            "fileSystemInfo": {
                "createdDateTime": format_timestamp(created),
                "lastModifiedDateTime": format_timestamp(modified),
            }
        });
        debug!(id = %item.id, %created, %modified, "GraphCloudProvider::update_file_dates");

        let updated: GraphDriveItem = self
            .client
            .send(Method::PATCH, &path, |r| r.json(&body))
            .await?
            .json()
            .await
            .map_err(network_error)?;
        updated.into_remote_entry()
    }

    /// Streams `GET /me/drive/items/{id}/content` into `target`
    async fn download(&self, item: &RemoteEntry, target: &Path) -> Result<u64, CloudError> {
        let path = format!("/me/drive/items/{}/content", item.id.as_str());
        debug!(id = %item.id, target = %target.display(), "GraphCloudProvider::download");

        let response = self.client.send(Method::GET, &path, |r| r).await?;
        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!(id = %item.id, bytes = written, "Download completed");
        Ok(written)
    }

    /// Deletes via `DELETE /me/drive/items/{id}` (moves it to the recycle bin)
    async fn delete(&self, item: &RemoteEntry) -> Result<(), CloudError> {
        let path = format!("/me/drive/items/{}", item.id.as_str());
        debug!(id = %item.id, "GraphCloudProvider::delete");
        self.client.send(Method::DELETE, &path, |r| r).await?;
        Ok(())
    }
}
