//! odsync Graph - Microsoft Graph API adapter
//!
//! Provides the async [`ICloudProvider`](odsync_core::ports::ICloudProvider)
//! implementation for OneDrive:
//! - Bearer authentication with transparent token refresh
//! - Folder listing, creation, deletion and date updates
//! - Simple and resumable (chunked) uploads
//! - Streaming downloads
//!
//! ## Modules
//!
//! - [`auth`] - Token sources, key file storage and OAuth2 refresh
//! - [`client`] - Microsoft Graph API HTTP client and error mapping
//! - [`items`] - DriveItem wire model
//! - [`provider`] - `GraphCloudProvider`, the port implementation
//! - [`upload`] - Upload endpoints (single request and session chunks)

pub mod auth;
pub mod client;
pub mod items;
pub mod provider;
pub mod upload;

pub use client::GraphClient;
pub use provider::GraphCloudProvider;
