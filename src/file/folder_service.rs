//! Folder tree operations: create, rename, move, and cascading delete.
//!
//! Tree mutations are check-then-act sequences (sibling-name checks, cycle
//! checks) that SQLite alone cannot make atomic, so each owner's mutations
//! are serialized behind an async mutex. Different owners never contend.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{Database, OwnerLocks};
use crate::file::{FileRepository, FileStorage, Folder, FolderRepository, NewFolder, StoredFile};
use crate::quota::QuotaLedger;
use crate::{CirrusError, Result};

/// A folder together with its immediate contents.
#[derive(Debug)]
pub struct FolderContents {
    /// The folder itself.
    pub folder: Folder,
    /// Direct child folders, ordered by name.
    pub subfolders: Vec<Folder>,
    /// Files directly inside the folder.
    pub files: Vec<StoredFile>,
}

/// Folder tree service.
pub struct FolderService<'a> {
    pool: &'a SqlitePool,
    storage: &'a FileStorage,
    locks: Arc<OwnerLocks>,
}

impl<'a> FolderService<'a> {
    /// Create a new FolderService.
    ///
    /// The lock map comes from the [`Database`], so any number of service
    /// instances over the same store contend on the same per-owner locks.
    pub fn new(db: &'a Database, storage: &'a FileStorage) -> Self {
        Self {
            pool: db.pool(),
            storage,
            locks: db.tree_locks(),
        }
    }

    /// Create a folder, optionally under a parent.
    pub async fn create(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<Folder> {
        let name = validated_name(name)?;

        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let repo = FolderRepository::new(self.pool);
        if let Some(pid) = parent_id {
            repo.get_by_id_and_owner(pid, owner_id)
                .await?
                .ok_or_else(|| CirrusError::NotFound(format!("folder {pid}")))?;
        }
        if repo.sibling_exists(owner_id, parent_id, name, None).await? {
            return Err(CirrusError::DuplicateName(name.to_string()));
        }

        let mut new_folder = NewFolder::new(name, owner_id);
        if let Some(pid) = parent_id {
            new_folder = new_folder.with_parent(pid);
        }
        let folder = repo.create(&new_folder).await?;

        info!(owner_id, folder_id = folder.id, name, "folder created");
        Ok(folder)
    }

    /// Rename a folder. The new name must be free among its siblings.
    pub async fn rename(&self, owner_id: i64, folder_id: i64, new_name: &str) -> Result<Folder> {
        let new_name = validated_name(new_name)?;

        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let repo = FolderRepository::new(self.pool);
        let folder = repo
            .get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        if repo
            .sibling_exists(owner_id, folder.parent_id, new_name, Some(folder.id))
            .await?
        {
            return Err(CirrusError::DuplicateName(new_name.to_string()));
        }

        repo.set_name(folder.id, new_name).await?;
        repo.get_by_id_and_owner(folder.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))
    }

    /// Move a folder under a new parent (or to the root with `None`).
    ///
    /// Rejects moves that would make the folder its own ancestor.
    pub async fn move_folder(
        &self,
        owner_id: i64,
        folder_id: i64,
        new_parent_id: Option<i64>,
    ) -> Result<Folder> {
        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let repo = FolderRepository::new(self.pool);
        let folder = repo
            .get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        if let Some(pid) = new_parent_id {
            repo.get_by_id_and_owner(pid, owner_id)
                .await?
                .ok_or_else(|| CirrusError::NotFound(format!("folder {pid}")))?;

            if pid == folder.id {
                return Err(CirrusError::CycleDetected(folder.name.clone()));
            }
            // Walk the target's ancestor chain; hitting the moved folder
            // means the move would fold the tree back onto itself.
            if repo.ancestor_ids(owner_id, pid).await?.contains(&folder.id) {
                return Err(CirrusError::CycleDetected(folder.name.clone()));
            }
        }

        if repo
            .sibling_exists(owner_id, new_parent_id, &folder.name, Some(folder.id))
            .await?
        {
            return Err(CirrusError::DuplicateName(folder.name.clone()));
        }

        repo.set_parent(folder.id, new_parent_id).await?;

        info!(owner_id, folder_id, ?new_parent_id, "folder moved");
        repo.get_by_id_and_owner(folder.id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))
    }

    /// Delete a folder and everything beneath it.
    ///
    /// Each file's catalog row is removed first and its quota released
    /// only when that removal actually happened, so a racing single-file
    /// delete can never release the same bytes twice. Folder rows go
    /// last, deepest-first, so foreign keys hold at every step. Missing
    /// bytes are logged and skipped; their quota is still released.
    pub async fn delete(&self, owner_id: i64, folder_id: i64) -> Result<()> {
        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let repo = FolderRepository::new(self.pool);
        repo.get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        // Breadth-first expansion of the subtree rooted at folder_id.
        let mut subtree = vec![folder_id];
        let mut cursor = 0;
        while cursor < subtree.len() {
            let children = repo.list_by_parent(owner_id, subtree[cursor]).await?;
            subtree.extend(children.iter().map(|f| f.id));
            cursor += 1;
        }

        let file_repo = FileRepository::new(self.pool);
        let files = file_repo.list_by_folders(owner_id, &subtree).await?;

        let mut released: i64 = 0;
        let mut removed_files: usize = 0;
        for file in &files {
            // A row already gone was deleted (and released) elsewhere
            if !file_repo.delete(file.id).await? {
                continue;
            }
            removed_files += 1;
            released += file.size;

            if let Err(e) = self.storage.remove(file.storage_path.as_ref()) {
                warn!(
                    file_id = file.id,
                    path = %file.storage_path,
                    error = %e,
                    "failed to remove file bytes during folder delete"
                );
            }
        }

        if released > 0 {
            QuotaLedger::new(self.pool)
                .release(owner_id, released)
                .await?;
        }
        for id in subtree.iter().rev() {
            repo.delete(*id).await?;
        }

        info!(
            owner_id,
            folder_id,
            folders = subtree.len(),
            files = removed_files,
            bytes = released,
            "folder deleted"
        );
        Ok(())
    }

    /// List an owner's root-level folders.
    pub async fn list_root(&self, owner_id: i64) -> Result<Vec<Folder>> {
        FolderRepository::new(self.pool).list_root(owner_id).await
    }

    /// List the direct children of a folder.
    pub async fn list_children(&self, owner_id: i64, folder_id: i64) -> Result<Vec<Folder>> {
        let repo = FolderRepository::new(self.pool);
        repo.get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        repo.list_by_parent(owner_id, folder_id).await
    }

    /// Fetch a folder together with its immediate subfolders and files.
    pub async fn get_with_contents(&self, owner_id: i64, folder_id: i64) -> Result<FolderContents> {
        let repo = FolderRepository::new(self.pool);
        let folder = repo
            .get_by_id_and_owner(folder_id, owner_id)
            .await?
            .ok_or_else(|| CirrusError::NotFound(format!("folder {folder_id}")))?;

        let subfolders = repo.list_by_parent(owner_id, folder.id).await?;
        let files = FileRepository::new(self.pool)
            .list_by_folder(owner_id, folder.id)
            .await?;

        Ok(FolderContents {
            folder,
            subfolders,
            files,
        })
    }
}

fn validated_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CirrusError::InvalidInput(
            "folder name must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
