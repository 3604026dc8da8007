//! Sync tasks
//!
//! Every unit of work a run performs is a [`Task`]. Check tasks compare the
//! two trees and enqueue the operations needed to make the destination match
//! the source; operation tasks perform exactly one change each.
//!
//! ## Priorities
//!
//! | Task           | Priority |
//! |----------------|----------|
//! | DirectoryCheck | 10       |
//! | CreateFolder   | 20       |
//! | Delete         | 30       |
//! | FileCheck      | 50       |
//! | UpdateMetadata | 70       |
//! | Upload         | 90       |
//! | Download       | 90       |
//!
//! Walking the tree first keeps the queue supplied with work, and cheap
//! operations run before bulk transfers. Ordering between dependent tasks is
//! never left to priority: a follow-up is enqueued by the task it depends on.

mod check;
mod leaf;
mod transfer;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use odsync_core::domain::{LocalEntry, RemoteEntry};

use crate::scheduler::Scheduled;

pub const DIRECTORY_CHECK_PRIORITY: u32 = 10;
pub const CREATE_FOLDER_PRIORITY: u32 = 20;
pub const DELETE_PRIORITY: u32 = 30;
pub const FILE_CHECK_PRIORITY: u32 = 50;
pub const UPDATE_METADATA_PRIORITY: u32 = 70;
pub const TRANSFER_PRIORITY: u32 = 90;

/// The side of the sync an operation task acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Remote(RemoteEntry),
    Local(PathBuf),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(entry) => write!(f, "remote {}", entry.name),
            Self::Local(path) => write!(f, "local {}", path.display()),
        }
    }
}

/// A unit of sync work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Compare the children of a remote folder with a local directory
    DirectoryCheck { remote: RemoteEntry, local: PathBuf },

    /// Compare a file present on both sides
    FileCheck {
        /// Remote folder containing `remote`
        parent: RemoteEntry,
        remote: RemoteEntry,
        local: LocalEntry,
    },

    /// Upload a local file into a remote folder
    Upload {
        parent: RemoteEntry,
        local: LocalEntry,
        /// Overwrite an existing remote file of the same name
        replace: bool,
    },

    /// Create a remote folder for a local directory, then upload its contents
    CreateFolder { parent: RemoteEntry, local: LocalEntry },

    /// Set timestamps without touching content
    UpdateMetadata {
        target: Target,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    },

    /// Remove an item, then optionally enqueue a follow-up task
    Delete {
        target: Target,
        then: Option<Box<Task>>,
    },

    /// Download a remote file, or a remote folder with its contents
    Download { remote: RemoteEntry, local: PathBuf },
}

impl Task {
    /// The task that brings a local-only entry to the remote side
    pub fn upload_new(parent: &RemoteEntry, local: LocalEntry) -> Self {
        if local.is_directory() {
            Self::CreateFolder {
                parent: parent.clone(),
                local,
            }
        } else {
            Self::Upload {
                parent: parent.clone(),
                local,
                replace: false,
            }
        }
    }

    /// Short name of the task kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryCheck { .. } => "DirectoryCheck",
            Self::FileCheck { .. } => "FileCheck",
            Self::Upload { .. } => "Upload",
            Self::CreateFolder { .. } => "CreateFolder",
            Self::UpdateMetadata { .. } => "UpdateMetadata",
            Self::Delete { .. } => "Delete",
            Self::Download { .. } => "Download",
        }
    }
}

impl Scheduled for Task {
    fn priority(&self) -> u32 {
        match self {
            Self::DirectoryCheck { .. } => DIRECTORY_CHECK_PRIORITY,
            Self::CreateFolder { .. } => CREATE_FOLDER_PRIORITY,
            Self::Delete { .. } => DELETE_PRIORITY,
            Self::FileCheck { .. } => FILE_CHECK_PRIORITY,
            Self::UpdateMetadata { .. } => UPDATE_METADATA_PRIORITY,
            Self::Upload { .. } | Self::Download { .. } => TRANSFER_PRIORITY,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryCheck { remote, local } => {
                write!(f, "DirectoryCheck {} <-> {}", remote.name, local.display())
            }
            Self::FileCheck { local, .. } => write!(f, "FileCheck {}", local.path.display()),
            Self::Upload { local, replace, .. } => {
                let mode = if *replace { " (replace)" } else { "" };
                write!(f, "Upload {}{mode}", local.path.display())
            }
            Self::CreateFolder { parent, local } => {
                write!(f, "CreateFolder {}/{}", parent.name, local.name)
            }
            Self::UpdateMetadata { target, .. } => write!(f, "UpdateMetadata {target}"),
            Self::Delete { target, then } => match then {
                Some(next) => write!(f, "Delete {target}, then {next}"),
                None => write!(f, "Delete {target}"),
            },
            Self::Download { remote, local } => {
                write!(f, "Download {} -> {}", remote.name, local.display())
            }
        }
    }
}
