//! Owner records for Cirrus.
//!
//! The engine never creates or deletes owners on its own; the surrounding
//! system registers them here. The engine only adjusts `storage_used`
//! (through the quota ledger).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::quota::DEFAULT_MAX_STORAGE;
use crate::{CirrusError, Result};

/// An account under whose identity files and folders are stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Owner {
    /// Unique owner ID.
    pub id: i64,
    /// Owner name (unique).
    pub name: String,
    /// Bytes currently charged against the quota.
    pub storage_used: i64,
    /// Storage ceiling in bytes (immutable after creation).
    pub max_storage: i64,
    /// When the owner was registered.
    pub created_at: String,
}

impl Owner {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for registering a new owner.
#[derive(Debug, Clone)]
pub struct NewOwner {
    /// Owner name.
    pub name: String,
    /// Storage ceiling in bytes.
    pub max_storage: i64,
}

impl NewOwner {
    /// Create a new NewOwner with the default 10 GiB quota.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_storage: DEFAULT_MAX_STORAGE,
        }
    }

    /// Set the storage ceiling.
    pub fn with_max_storage(mut self, max_storage: i64) -> Self {
        self.max_storage = max_storage;
        self
    }
}

/// Repository for owner records.
pub struct OwnerRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OwnerRepository<'a> {
    /// Create a new OwnerRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new owner.
    pub async fn create(&self, owner: &NewOwner) -> Result<Owner> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO owners (name, max_storage) VALUES (?, ?) RETURNING id")
                .bind(&owner.name)
                .bind(owner.max_storage)
                .fetch_one(self.pool)
                .await
                .map_err(|e| CirrusError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CirrusError::NotFound("owner".to_string()))
    }

    /// Get an owner by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Owner>> {
        let owner = sqlx::query_as::<_, Owner>(
            "SELECT id, name, storage_used, max_storage, created_at FROM owners WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(owner)
    }

    /// Get an owner by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Owner>> {
        let owner = sqlx::query_as::<_, Owner>(
            "SELECT id, name, storage_used, max_storage, created_at FROM owners WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        Ok(owner)
    }
}
