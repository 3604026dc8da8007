//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICloudProvider`] - Remote drive operations (OneDrive via Microsoft Graph)
//! - [`ILocalFileSystem`] - Local filesystem reads, checksums and mutations

pub mod cloud_provider;
pub mod local_filesystem;

pub use cloud_provider::{
    ChunkOutcome, CloudError, ConflictBehavior, DriveInfo, ICloudProvider, Tokens,
    UploadSessionHandle,
};
pub use local_filesystem::ILocalFileSystem;
