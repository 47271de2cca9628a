//! High-level file operations: upload, download, delete, rename, move,
//! sharing, and per-owner storage statistics.
//!
//! Every mutating operation here keeps three things consistent: the bytes
//! on disk, the catalog row, and the owner's quota ledger. When a later
//! step fails, the earlier steps are compensated in reverse order.

use rand::RngCore;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{Database, OwnerRepository};
use crate::file::{FileRepository, FileStorage, FolderRepository, NewFile, StoredFile};
use crate::quota::QuotaLedger;
use crate::{CirrusError, Result};

/// Number of random bytes in a share token (hex-encoded to 64 chars).
const SHARE_TOKEN_BYTES: usize = 32;

/// A downloaded file: its catalog record plus the content bytes.
#[derive(Debug)]
pub struct DownloadResult {
    /// Catalog record, with `download_count` already incremented.
    pub metadata: StoredFile,
    /// The file content.
    pub content: Vec<u8>,
}

/// Per-owner storage usage summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Bytes currently charged to the owner's quota.
    pub used_bytes: i64,
    /// The owner's quota limit.
    pub max_bytes: i64,
    /// Number of live files.
    pub file_count: i64,
    /// Number of root-level folders.
    pub root_folder_count: i64,
}

/// File operations service tying together storage, catalog, and quota.
pub struct FileService<'a> {
    pool: &'a SqlitePool,
    storage: &'a FileStorage,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, storage: &'a FileStorage) -> Self {
        Self {
            pool: db.pool(),
            storage,
        }
    }

    /// Upload a file for an owner, optionally into a folder.
    ///
    /// Quota is reserved before any byte hits the disk. If placement or
    /// record creation fails afterwards, the reservation (and any placed
    /// bytes) are rolled back.
    pub async fn upload(
        &self,
        owner_id: i64,
        folder_id: Option<i64>,
        original_name: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<StoredFile> {
        // Resolve the target folder first so a bad folder ID costs nothing.
        if let Some(fid) = folder_id {
            FolderRepository::new(self.pool)
                .get_by_id_and_owner(fid, owner_id)
                .await?
                .ok_or_else(|| CirrusError::NotFound(format!("folder {fid}")))?;
        }

        let size = content.len() as i64;
        let ledger = QuotaLedger::new(self.pool);
        ledger.reserve(owner_id, size).await?;

        let placed = match self.storage.place(owner_id, content, original_name) {
            Ok(placed) => placed,
            Err(e) => {
                // The placement failure is the error worth reporting
                if let Err(release_err) = ledger.release(owner_id, size).await {
                    warn!(owner_id, error = %release_err,
                          "failed to release reservation after placement failure");
                }
                return Err(e);
            }
        };

        let mut new_file = NewFile::new(
            &placed.stored_name,
            original_name,
            placed.size,
            placed.storage_path.to_string_lossy().to_string(),
            owner_id,
        );
        if let Some(ct) = content_type {
            new_file = new_file.with_content_type(ct);
        }
        if let Some(checksum) = &placed.checksum {
            new_file = new_file.with_checksum(checksum);
        }
        if let Some(fid) = folder_id {
            new_file = new_file.with_folder(fid);
        }

        let file = match FileRepository::new(self.pool).create(&new_file).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(remove_err) = self.storage.remove(&placed.storage_path) {
                    warn!(path = %placed.storage_path.display(), error = %remove_err,
                          "failed to remove bytes after catalog insert failure");
                }
                if let Err(release_err) = ledger.release(owner_id, size).await {
                    warn!(owner_id, error = %release_err,
                          "failed to release reservation after catalog insert failure");
                }
                return Err(e);
            }
        };

        info!(
            owner_id,
            file_id = file.id,
            name = %file.original_name,
            size = file.size,
            "file uploaded"
        );
        Ok(file)
    }

    /// Upload several files into the same folder.
    ///
    /// Uploads run in order and stop at the first failure; files placed
    /// before it remain stored and charged.
    pub async fn upload_many(
        &self,
        owner_id: i64,
        folder_id: Option<i64>,
        entries: &[(&str, Option<&str>, &[u8])],
    ) -> Result<Vec<StoredFile>> {
        let mut uploaded = Vec::with_capacity(entries.len());
        for &(name, content_type, content) in entries {
            uploaded.push(
                self.upload(owner_id, folder_id, name, content_type, content)
                    .await?,
            );
        }
        Ok(uploaded)
    }

    /// Fetch a file's catalog record without touching the bytes or the
    /// download count.
    pub async fn get_file(&self, owner_id: i64, file_id: i64) -> Result<StoredFile> {
        FileRepository::new(self.pool)
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))
    }

    /// Download a file for its owner. Bumps the download count.
    pub async fn download(&self, owner_id: i64, file_id: i64) -> Result<DownloadResult> {
        let repo = FileRepository::new(self.pool);
        let mut metadata = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        let content = self.storage.load(metadata.storage_path.as_ref())?;
        metadata.download_count = repo.increment_downloads(metadata.id).await?;

        Ok(DownloadResult { metadata, content })
    }

    /// Download a publicly shared file by token, without owner credentials.
    pub async fn download_shared(&self, token: &str) -> Result<DownloadResult> {
        let mut metadata = self.resolve_shared(token).await?;

        let content = self.storage.load(metadata.storage_path.as_ref())?;
        metadata.download_count = FileRepository::new(self.pool)
            .increment_downloads(metadata.id)
            .await?;

        Ok(DownloadResult { metadata, content })
    }

    /// Look up the catalog record behind a share token.
    pub async fn resolve_shared(&self, token: &str) -> Result<StoredFile> {
        FileRepository::new(self.pool)
            .get_by_share_token(token)
            .await?
            .ok_or_else(|| CirrusError::NotFound("shared file".to_string()))
    }

    /// Delete a file: catalog record, quota charge, and bytes.
    ///
    /// The catalog row goes first, and only the caller that actually
    /// removed it releases the quota, so a delete racing a cascade of
    /// the containing folder never releases the same bytes twice.
    /// Missing bytes on disk are logged but never block the delete.
    pub async fn delete(&self, owner_id: i64, file_id: i64) -> Result<()> {
        let repo = FileRepository::new(self.pool);
        let file = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        // Row already gone: a concurrent delete won and released
        if !repo.delete(file.id).await? {
            return Ok(());
        }

        QuotaLedger::new(self.pool)
            .release(owner_id, file.size)
            .await?;

        if let Err(e) = self.storage.remove(file.storage_path.as_ref()) {
            warn!(
                file_id,
                path = %file.storage_path,
                error = %e,
                "failed to remove file bytes for deleted record"
            );
        }

        info!(owner_id, file_id, size = file.size, "file deleted");
        Ok(())
    }

    /// Rename a file's display name. The stored name and bytes never move.
    pub async fn rename(&self, owner_id: i64, file_id: i64, new_name: &str) -> Result<StoredFile> {
        if new_name.trim().is_empty() {
            return Err(CirrusError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }

        let repo = FileRepository::new(self.pool);
        let file = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        repo.set_original_name(file.id, new_name).await?;
        repo.get_by_id_and_owner(file.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))
    }

    /// Move a file to another folder (or to the root with `None`).
    ///
    /// Only the catalog's folder reference changes; the bytes stay put.
    pub async fn move_file(
        &self,
        owner_id: i64,
        file_id: i64,
        target_folder_id: Option<i64>,
    ) -> Result<StoredFile> {
        let repo = FileRepository::new(self.pool);
        let file = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        if let Some(fid) = target_folder_id {
            FolderRepository::new(self.pool)
                .get_by_id_and_owner(fid, owner_id)
                .await?
                .ok_or_else(|| CirrusError::NotFound(format!("folder {fid}")))?;
        }

        repo.set_folder(file.id, target_folder_id).await?;
        repo.get_by_id_and_owner(file.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))
    }

    /// Make a file publicly shareable and return its updated record.
    ///
    /// Re-sharing an already-public file issues a fresh token; the old
    /// one stops resolving.
    pub async fn share(&self, owner_id: i64, file_id: i64) -> Result<StoredFile> {
        let repo = FileRepository::new(self.pool);
        let file = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        let token = generate_share_token();
        repo.set_sharing(file.id, Some(&token), true).await?;

        info!(owner_id, file_id, "file shared");
        repo.get_by_id_and_owner(file.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))
    }

    /// Revoke public sharing. Idempotent on non-shared files.
    pub async fn unshare(&self, owner_id: i64, file_id: i64) -> Result<StoredFile> {
        let repo = FileRepository::new(self.pool);
        let file = repo
            .get_by_id_and_owner(file_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))?;

        repo.set_sharing(file.id, None, false).await?;

        info!(owner_id, file_id, "file unshared");
        repo.get_by_id_and_owner(file.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("file {file_id}")))
    }

    /// Per-owner usage summary.
    pub async fn stats(&self, owner_id: i64) -> Result<StorageStats> {
        let owner = OwnerRepository::new(self.pool)
            .get_by_id(owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("owner {owner_id}")))?;

        let repo = FileRepository::new(self.pool);
        Ok(StorageStats {
            used_bytes: QuotaLedger::new(self.pool).used(owner_id).await?,
            max_bytes: owner.max_storage,
            file_count: repo.count_by_owner(owner_id).await?,
            root_folder_count: FolderRepository::new(self.pool).count_root(owner_id).await?,
        })
    }

    /// List all of an owner's files.
    pub async fn list_files(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        FileRepository::new(self.pool).list_by_owner(owner_id).await
    }

    /// List an owner's root-level files.
    pub async fn list_root_files(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        FileRepository::new(self.pool).list_root(owner_id).await
    }

    /// List the files in one of the owner's folders.
    pub async fn list_files_in_folder(
        &self,
        owner_id: i64,
        folder_id: i64,
    ) -> Result<Vec<StoredFile>> {
        FolderRepository::new(self.pool)
            .get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        FileRepository::new(self.pool)
            .list_by_folder(owner_id, folder_id)
            .await
    }

    /// Case-insensitive search over an owner's file names.
    pub async fn search(&self, owner_id: i64, query: &str) -> Result<Vec<StoredFile>> {
        FileRepository::new(self.pool)
            .search_by_name(owner_id, query)
            .await
    }
}

/// Generate an unguessable share token: 32 random bytes, hex-encoded.
fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
