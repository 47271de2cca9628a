//! File storage engine: per-owner files and folder trees backed by
//! durable storage and a SQLite catalog, with quota enforcement.
//!
//! The module splits along the same lines as the data: [`storage`] owns
//! the bytes on disk, [`metadata`] and [`folder`] own the catalog rows,
//! and [`service`] / [`folder_service`] combine them with the quota
//! ledger into the operations callers actually use.

mod folder;
mod folder_service;
mod metadata;
mod service;
mod storage;

pub use folder::{Folder, FolderRepository, NewFolder};
pub use folder_service::{FolderContents, FolderService};
pub use metadata::{FileRepository, NewFile, StoredFile};
pub use service::{DownloadResult, FileService, StorageStats};
pub use storage::{FileStorage, PlacedFile};

/// Longest accepted display name, in characters.
pub const MAX_FILENAME_LENGTH: usize = 255;
