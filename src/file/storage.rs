//! Physical file placement for Cirrus.
//!
//! Files live under an owner-scoped directory:
//! ```text
//! {root}/
//! ├── 1/
//! │   └── ab12cd34-5678-90ab-cdef-123456789012.txt
//! ├── 2/
//! │   └── cd90ab12-3456-7890-abcd-ef1234567890
//! └── ...
//! ```
//! Stored names are random UUIDs carrying the original extension, so the
//! user-supplied name never touches the filesystem.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::{CirrusError, Result};

use super::MAX_FILENAME_LENGTH;

/// Outcome of a successful placement.
#[derive(Debug, Clone)]
pub struct PlacedFile {
    /// Generated filesystem-safe name (UUID, plus the original extension).
    pub stored_name: String,
    /// Absolute path the bytes were written to.
    pub storage_path: PathBuf,
    /// Number of bytes written.
    pub size: i64,
    /// SHA-256 of the bytes as persisted, hex-encoded.
    ///
    /// None when the read-back failed; placement still succeeds.
    pub checksum: Option<String>,
}

/// Storage service writing, reading, and deleting file content on disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Canonicalized storage root.
    root: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at the given path.
    ///
    /// The root directory is created if absent and canonicalized, so the
    /// escape check in [`place`](Self::place) compares against a stable,
    /// symlink-free base.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;

        Ok(Self { root })
    }

    /// Get the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the directory holding an owner's files.
    pub fn owner_dir(&self, owner_id: i64) -> PathBuf {
        self.root.join(owner_id.to_string())
    }

    /// Durably place uploaded content under the owner's directory.
    ///
    /// Rejects empty content and unsafe names with `InvalidInput`. The
    /// destination is normalized and re-verified to sit directly inside the
    /// owner directory (`PathEscape` on violation) even though the name is
    /// generated. The checksum certifies the bytes as written to disk; a
    /// checksum failure is logged and degrades to `None`.
    pub fn place(&self, owner_id: i64, content: &[u8], original_name: &str) -> Result<PlacedFile> {
        if content.is_empty() {
            return Err(CirrusError::InvalidInput(
                "cannot store empty file".to_string(),
            ));
        }
        if !is_safe_filename(original_name) {
            return Err(CirrusError::InvalidInput(format!(
                "invalid filename: {original_name}"
            )));
        }

        let stored_name = generate_stored_name(original_name);
        let owner_dir = self.owner_dir(owner_id);

        let destination = normalize(&owner_dir.join(&stored_name));
        if destination.parent() != Some(owner_dir.as_path()) {
            return Err(CirrusError::PathEscape(
                destination.display().to_string(),
            ));
        }

        fs::create_dir_all(&owner_dir)?;
        fs::write(&destination, content)?;

        let checksum = compute_checksum(&destination);

        Ok(PlacedFile {
            stored_name,
            storage_path: destination,
            size: content.len() as i64,
            checksum,
        })
    }

    /// Load file content from storage.
    pub fn load(&self, storage_path: &Path) -> Result<Vec<u8>> {
        match fs::read(storage_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CirrusError::NotFound(format!(
                "file at {}",
                storage_path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a file from storage.
    ///
    /// Idempotent: returns `false` (not an error) if the file was already
    /// gone.
    pub fn remove(&self, storage_path: &Path) -> Result<bool> {
        match fs::remove_file(storage_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a file exists in storage.
    pub fn exists(&self, storage_path: &Path) -> bool {
        storage_path.exists()
    }

    /// Recursively remove an owner's entire directory tree, deepest entries
    /// first (account purge).
    ///
    /// Partial deletion is reported: the first entry that fails to delete
    /// aborts with a `Storage` error. A missing owner directory is fine.
    pub fn remove_owner_directory(&self, owner_id: i64) -> Result<()> {
        let owner_dir = self.owner_dir(owner_id);
        if !owner_dir.exists() {
            return Ok(());
        }

        remove_tree(&owner_dir)?;
        Ok(())
    }
}

/// Delete a directory tree, children before parents.
fn remove_tree(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            remove_tree(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    fs::remove_dir(dir)?;
    Ok(())
}

/// Extract the file extension from a filename (everything after the last
/// dot), or None if there is none.
pub fn extract_extension(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|s| s.to_str())
}

/// Generate a new UUID-based stored name, preserving the extension.
///
/// The dot is omitted when the original name has no extension.
pub fn generate_stored_name(original_name: &str) -> String {
    let uuid = Uuid::new_v4();
    match extract_extension(original_name) {
        Some(ext) => format!("{uuid}.{ext}"),
        None => uuid.to_string(),
    }
}

/// Check whether a name is a safe relative filename.
///
/// Rejects empty names, path separators, NUL bytes, parent-directory
/// segments, and over-long names.
pub fn is_safe_filename(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > MAX_FILENAME_LENGTH {
        return false;
    }
    if name.contains('\0') || name.contains('/') || name.contains('\\') {
        return false;
    }
    if name == "." || name.contains("..") {
        return false;
    }
    true
}

/// Lexically normalize a path, resolving `.` and `..` components without
/// touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Compute the SHA-256 digest of a file on disk, hex-encoded.
///
/// Reads the bytes back from disk (not from the upload buffer) to certify
/// what was actually persisted. Returns None on failure; the caller treats
/// a missing checksum as non-fatal.
pub fn compute_checksum(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => {
            let digest = Sha256::digest(&bytes);
            Some(digest.iter().map(|b| format!("{b:02x}")).collect())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to compute checksum");
            None
        }
    }
}
