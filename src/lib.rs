//! Cirrus is a hierarchical file storage engine: per-owner files and
//! folder trees on durable storage, a SQLite catalog, byte-accurate
//! quota enforcement, and token-based public sharing.
//!
//! The crate is organized as a set of layered modules:
//!
//! - [`config`] — TOML configuration with serde defaults
//! - [`db`] — SQLite pool, migrations, and the owner repository
//! - [`quota`] — the per-owner storage ledger
//! - [`file`] — byte placement, the file/folder catalog, and the
//!   services that tie them together
//! - [`error`] — the crate-wide error type
//! - [`logging`] — tracing subscriber setup

pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod quota;

pub use config::Config;
pub use db::{Database, NewOwner, Owner, OwnerLocks, OwnerRepository};
pub use error::{CirrusError, Result};
pub use file::{
    DownloadResult, FileRepository, FileService, FileStorage, Folder, FolderContents,
    FolderRepository, FolderService, NewFile, NewFolder, StoredFile, StorageStats,
};
pub use quota::{QuotaLedger, DEFAULT_MAX_STORAGE};
