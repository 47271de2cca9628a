//! Folder types and repository for the Cirrus folder tree.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{CirrusError, Result};

/// A folder in an owner's tree.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name (unique among siblings).
    pub name: String,
    /// Owner of the folder.
    pub owner_id: i64,
    /// Parent folder ID (None for root-level folders).
    pub parent_id: Option<i64>,
    /// When the folder was created.
    pub created_at: String,
    /// When the folder was last renamed or moved.
    pub updated_at: String,
}

impl Folder {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Owner of the folder.
    pub owner_id: i64,
    /// Parent folder ID (None for root-level).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a new root-level NewFolder.
    pub fn new(name: impl Into<String>, owner_id: i64) -> Self {
        Self {
            name: name.into(),
            owner_id,
            parent_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Repository for folder records.
///
/// Every lookup is owner-scoped; a folder ID belonging to another owner
/// behaves exactly like a missing one.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (name, owner_id, parent_id) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&folder.name)
        .bind(folder.owner_id)
        .bind(folder.parent_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        self.get_by_id_and_owner(id, folder.owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID, scoped to an owner.
    pub async fn get_by_id_and_owner(&self, id: i64, owner_id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, owner_id, parent_id, created_at, updated_at
             FROM folders WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(folder)
    }

    /// List an owner's root-level folders (parent_id is NULL).
    pub async fn list_root(&self, owner_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, owner_id, parent_id, created_at, updated_at
             FROM folders WHERE owner_id = ? AND parent_id IS NULL ORDER BY name, id",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// List child folders of a parent folder.
    pub async fn list_by_parent(&self, owner_id: i64, parent_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, owner_id, parent_id, created_at, updated_at
             FROM folders WHERE owner_id = ? AND parent_id = ? ORDER BY name, id",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// Check whether a sibling with the given name exists under a parent.
    ///
    /// `exclude_id` skips one folder (used when renaming or moving, so a
    /// folder never collides with itself).
    pub async fn sibling_exists(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM folders
                 WHERE owner_id = ? AND parent_id IS ? AND name = ? AND id != COALESCE(?, -1)
             )",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(exists != 0)
    }

    /// IDs of a folder's ancestor chain, from its parent up to the root.
    ///
    /// The chain is finite by the tree's acyclicity invariant.
    pub async fn ancestor_ids(&self, owner_id: i64, folder_id: i64) -> Result<Vec<i64>> {
        let mut ancestors = Vec::new();
        let mut current = self.get_by_id_and_owner(folder_id, owner_id).await?;

        while let Some(folder) = current {
            match folder.parent_id {
                Some(parent_id) => {
                    ancestors.push(parent_id);
                    current = self.get_by_id_and_owner(parent_id, owner_id).await?;
                }
                None => break,
            }
        }

        Ok(ancestors)
    }

    /// Rename a folder.
    pub async fn set_name(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE folders SET name = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(())
    }

    /// Reparent a folder.
    pub async fn set_parent(&self, id: i64, parent_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE folders SET parent_id = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(parent_id)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete a folder row by ID.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count an owner's root-level folders.
    pub async fn count_root(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folders WHERE owner_id = ? AND parent_id IS NULL",
        )
        .bind(owner_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewOwner, OwnerRepository};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let owner = OwnerRepository::new(db.pool())
            .create(&NewOwner::new("tester"))
            .await
            .unwrap();
        (db, owner.id)
    }

    #[tokio::test]
    async fn test_create_root_folder() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo
            .create(&NewFolder::new("Documents", owner_id))
            .await
            .unwrap();

        assert_eq!(folder.name, "Documents");
        assert_eq!(folder.owner_id, owner_id);
        assert!(folder.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_create_nested_folder() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let parent = repo
            .create(&NewFolder::new("Parent", owner_id))
            .await
            .unwrap();
        let child = repo
            .create(&NewFolder::new("Child", owner_id).with_parent(parent.id))
            .await
            .unwrap();

        assert_eq!(child.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn test_get_is_owner_scoped() {
        let (db, owner_id) = setup().await;
        let other = OwnerRepository::new(db.pool())
            .create(&NewOwner::new("other"))
            .await
            .unwrap();
        let repo = FolderRepository::new(db.pool());

        let folder = repo
            .create(&NewFolder::new("Private", owner_id))
            .await
            .unwrap();

        assert!(repo
            .get_by_id_and_owner(folder.id, owner_id)
            .await
            .unwrap()
            .is_some());
        // Another owner sees nothing
        assert!(repo
            .get_by_id_and_owner(folder.id, other.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_root_and_children() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let a = repo.create(&NewFolder::new("A", owner_id)).await.unwrap();
        repo.create(&NewFolder::new("B", owner_id)).await.unwrap();
        repo.create(&NewFolder::new("A1", owner_id).with_parent(a.id))
            .await
            .unwrap();

        let roots = repo.list_root(owner_id).await.unwrap();
        assert_eq!(roots.len(), 2);

        let children = repo.list_by_parent(owner_id, a.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "A1");
    }

    #[tokio::test]
    async fn test_sibling_exists() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let parent = repo.create(&NewFolder::new("P", owner_id)).await.unwrap();
        let child = repo
            .create(&NewFolder::new("Reports", owner_id).with_parent(parent.id))
            .await
            .unwrap();

        assert!(repo
            .sibling_exists(owner_id, Some(parent.id), "Reports", None)
            .await
            .unwrap());
        assert!(!repo
            .sibling_exists(owner_id, Some(parent.id), "Other", None)
            .await
            .unwrap());
        // Root level is a different sibling set
        assert!(!repo
            .sibling_exists(owner_id, None, "Reports", None)
            .await
            .unwrap());
        // Excluding the folder itself
        assert!(!repo
            .sibling_exists(owner_id, Some(parent.id), "Reports", Some(child.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_ancestor_ids() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let root = repo.create(&NewFolder::new("root", owner_id)).await.unwrap();
        let a = repo
            .create(&NewFolder::new("a", owner_id).with_parent(root.id))
            .await
            .unwrap();
        let b = repo
            .create(&NewFolder::new("b", owner_id).with_parent(a.id))
            .await
            .unwrap();

        assert_eq!(repo.ancestor_ids(owner_id, b.id).await.unwrap(), vec![a.id, root.id]);
        assert_eq!(repo.ancestor_ids(owner_id, root.id).await.unwrap(), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn test_set_name_and_parent() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new("Old", owner_id)).await.unwrap();
        let target = repo.create(&NewFolder::new("Target", owner_id)).await.unwrap();

        repo.set_name(folder.id, "New").await.unwrap();
        repo.set_parent(folder.id, Some(target.id)).await.unwrap();

        let updated = repo
            .get_by_id_and_owner(folder.id, owner_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.parent_id, Some(target.id));
    }

    #[tokio::test]
    async fn test_delete() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new("Gone", owner_id)).await.unwrap();

        assert!(repo.delete(folder.id).await.unwrap());
        assert!(repo
            .get_by_id_and_owner(folder.id, owner_id)
            .await
            .unwrap()
            .is_none());
        assert!(!repo.delete(folder.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_root() {
        let (db, owner_id) = setup().await;
        let repo = FolderRepository::new(db.pool());

        assert_eq!(repo.count_root(owner_id).await.unwrap(), 0);

        let a = repo.create(&NewFolder::new("A", owner_id)).await.unwrap();
        repo.create(&NewFolder::new("B", owner_id)).await.unwrap();
        repo.create(&NewFolder::new("A1", owner_id).with_parent(a.id))
            .await
            .unwrap();

        assert_eq!(repo.count_root(owner_id).await.unwrap(), 2);
    }
}
