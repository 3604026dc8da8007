//! Domain layer
//!
//! Pure types and decision logic with no I/O:
//!
//! - [`newtypes`] - Validated identifiers (`RemoteId`, `RemotePath`, `Crc32`)
//! - [`entry`] - `RemoteEntry` / `LocalEntry` metadata records
//! - [`change`] - Per-file change detection policy
//! - [`errors`] - Domain validation errors

pub mod change;
pub mod entry;
pub mod errors;
pub mod newtypes;

pub use change::{ChangeDecision, ChangeDetector, ChangePolicy, QuickCheck, SyncDirection};
pub use entry::{EntryKind, LocalEntry, RemoteEntry};
pub use errors::DomainError;
pub use newtypes::{Crc32, RemoteId, RemotePath};
