//! Stored-file metadata types and repository (the file catalog records).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{CirrusError, Result};

/// Catalog record for a stored file (distinct from its bytes).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredFile {
    /// Unique file ID.
    pub id: i64,
    /// Generated filesystem name (UUID.ext format).
    pub stored_name: String,
    /// User-supplied display name.
    pub original_name: String,
    /// MIME type as reported at upload, if any.
    pub content_type: Option<String>,
    /// File size in bytes (immutable after creation).
    pub size: i64,
    /// Absolute path on durable storage.
    pub storage_path: String,
    /// SHA-256 of the content at write time (None if computation failed).
    pub checksum: Option<String>,
    /// Owner of the file.
    pub owner_id: i64,
    /// Containing folder (None for root-level).
    pub folder_id: Option<i64>,
    /// Whether the file is publicly shared.
    pub is_public: bool,
    /// Unguessable token granting anonymous access while public.
    pub share_token: Option<String>,
    /// Number of successful retrievals.
    pub download_count: i64,
    /// When the file was uploaded.
    pub created_at: String,
    /// When the metadata was last modified.
    pub updated_at: String,
}

impl StoredFile {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for creating a new catalog record.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Generated filesystem name.
    pub stored_name: String,
    /// User-supplied display name.
    pub original_name: String,
    /// MIME type, if any.
    pub content_type: Option<String>,
    /// File size in bytes.
    pub size: i64,
    /// Absolute path on durable storage.
    pub storage_path: String,
    /// SHA-256 of the content, if computed.
    pub checksum: Option<String>,
    /// Owner of the file.
    pub owner_id: i64,
    /// Containing folder (None for root-level).
    pub folder_id: Option<i64>,
}

impl NewFile {
    /// Create a new NewFile for the root level without optional metadata.
    pub fn new(
        stored_name: impl Into<String>,
        original_name: impl Into<String>,
        size: i64,
        storage_path: impl Into<String>,
        owner_id: i64,
    ) -> Self {
        Self {
            stored_name: stored_name.into(),
            original_name: original_name.into(),
            content_type: None,
            size,
            storage_path: storage_path.into(),
            checksum: None,
            owner_id,
            folder_id: None,
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the checksum.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Set the containing folder.
    pub fn with_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

const SELECT_COLUMNS: &str = "id, stored_name, original_name, content_type, size, storage_path,
     checksum, owner_id, folder_id, is_public, share_token, download_count, created_at, updated_at";

/// Repository for file catalog records.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new catalog record.
    pub async fn create(&self, file: &NewFile) -> Result<StoredFile> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (stored_name, original_name, content_type, size, storage_path,
                                checksum, owner_id, folder_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&file.stored_name)
        .bind(&file.original_name)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(&file.storage_path)
        .bind(&file.checksum)
        .bind(file.owner_id)
        .bind(file.folder_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        self.get_by_id_and_owner(id, file.owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound("file".to_string()))
    }

    /// Get a file by ID, scoped to an owner.
    pub async fn get_by_id_and_owner(&self, id: i64, owner_id: i64) -> Result<Option<StoredFile>> {
        let file = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Look up a publicly shared file by its share token.
    ///
    /// Intentionally not owner-scoped, but only rows with `is_public` set
    /// resolve: a cleared token never serves.
    pub async fn get_by_share_token(&self, token: &str) -> Result<Option<StoredFile>> {
        let file = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE share_token = ? AND is_public = 1"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(file)
    }

    /// List all files of an owner.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE owner_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List an owner's root-level files (not inside any folder).
    pub async fn list_root(&self, owner_id: i64) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE owner_id = ? AND folder_id IS NULL
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List files in a folder.
    pub async fn list_by_folder(&self, owner_id: i64, folder_id: i64) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files WHERE owner_id = ? AND folder_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .bind(folder_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List files in any of the given folders (cascade delete support).
    pub async fn list_by_folders(
        &self,
        owner_id: i64,
        folder_ids: &[i64],
    ) -> Result<Vec<StoredFile>> {
        if folder_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: String = folder_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM files
             WHERE owner_id = ? AND folder_id IN ({placeholders})"
        );

        let mut query_builder = sqlx::query_as::<_, StoredFile>(&query).bind(owner_id);
        for folder_id in folder_ids {
            query_builder = query_builder.bind(folder_id);
        }

        let files = query_builder
            .fetch_all(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Case-insensitive substring search over display names.
    pub async fn search_by_name(&self, owner_id: i64, query: &str) -> Result<Vec<StoredFile>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {SELECT_COLUMNS} FROM files
             WHERE owner_id = ? AND LOWER(original_name) LIKE ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .bind(pattern)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Update the display name.
    pub async fn set_original_name(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query(
            "UPDATE files SET original_name = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(name)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(())
    }

    /// Reassign the containing folder.
    pub async fn set_folder(&self, id: i64, folder_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE files SET folder_id = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(folder_id)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(())
    }

    /// Set the sharing state. Token and flag always change together.
    pub async fn set_sharing(&self, id: i64, token: Option<&str>, is_public: bool) -> Result<()> {
        sqlx::query(
            "UPDATE files SET share_token = ?, is_public = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(token)
        .bind(is_public)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(())
    }

    /// Increment the download count for a file and return the new value.
    pub async fn increment_downloads(&self, id: i64) -> Result<i64> {
        sqlx::query("UPDATE files SET download_count = download_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        let downloads: i64 = sqlx::query_scalar("SELECT download_count FROM files WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(downloads)
    }

    /// Delete a catalog record by ID.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Total size of an owner's live files.
    pub async fn total_size_by_owner(&self, owner_id: i64) -> Result<i64> {
        let size: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM files WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(size)
    }

    /// Count an owner's files.
    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(count)
    }
}
