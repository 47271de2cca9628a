//! Per-owner storage quota ledger.
//!
//! `owners.storage_used` is the single authoritative byte counter per owner.
//! Reservation performs the check and the increment in one conditional
//! UPDATE, so two concurrent uploads can never both pass the check and
//! jointly exceed `max_storage`.

use sqlx::SqlitePool;
use tracing::debug;

use crate::{CirrusError, Result};

/// Default per-owner storage ceiling (10 GiB).
pub const DEFAULT_MAX_STORAGE: i64 = 10 * 1024 * 1024 * 1024;

/// Quota ledger over the owners table.
pub struct QuotaLedger<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaLedger<'a> {
    /// Create a new QuotaLedger with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Reserve `delta` bytes against the owner's quota.
    ///
    /// The check-and-increment is a single UPDATE statement; it only applies
    /// when `storage_used + delta <= max_storage` still holds at execution
    /// time. Fails with `QuotaExceeded` otherwise, or `NotFound` if the
    /// owner does not exist.
    pub async fn reserve(&self, owner_id: i64, delta: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE owners SET storage_used = storage_used + ?
             WHERE id = ? AND storage_used + ? <= max_storage",
        )
        .bind(delta)
        .bind(owner_id)
        .bind(delta)
        .execute(self.pool)
        .await
        .map_err(|e| CirrusError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            let row: Option<(i64, i64)> =
                sqlx::query_as("SELECT storage_used, max_storage FROM owners WHERE id = ?")
                    .bind(owner_id)
                    .fetch_optional(self.pool)
                    .await
                    .map_err(|e| CirrusError::Database(e.to_string()))?;

            return match row {
                None => Err(CirrusError::NotFound("owner".to_string())),
                Some((used, max)) => Err(CirrusError::QuotaExceeded(format!(
                    "maximum {}, used {}",
                    format_bytes(max),
                    format_bytes(used)
                ))),
            };
        }

        debug!(owner_id, delta, "quota reserved");
        Ok(())
    }

    /// Release `delta` bytes back to the owner's quota.
    ///
    /// Floored at zero. A release without a matching prior reserve is a
    /// logic error in the caller; the floor only keeps the counter sane.
    pub async fn release(&self, owner_id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE owners SET storage_used = MAX(storage_used - ?, 0) WHERE id = ?")
            .bind(delta)
            .bind(owner_id)
            .execute(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        debug!(owner_id, delta, "quota released");
        Ok(())
    }

    /// Read the bytes currently charged to an owner.
    pub async fn used(&self, owner_id: i64) -> Result<i64> {
        let used: Option<i64> = sqlx::query_scalar("SELECT storage_used FROM owners WHERE id = ?")
            .bind(owner_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| CirrusError::Database(e.to_string()))?;

        used.ok_or_else(|| CirrusError::NotFound("owner".to_string()))
    }
}

/// Format a byte count for human-readable quota messages.
pub fn format_bytes(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.2} KB", b / KB)
    } else if b < GB {
        format!("{:.2} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewOwner, OwnerRepository};
    use crate::Database;

    async fn setup(max_storage: i64) -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let owner = OwnerRepository::new(db.pool())
            .create(&NewOwner::new("tester").with_max_storage(max_storage))
            .await
            .unwrap();
        (db, owner.id)
    }

    #[tokio::test]
    async fn test_reserve_within_quota() {
        let (db, owner_id) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        ledger.reserve(owner_id, 600).await.unwrap();
        assert_eq!(ledger.used(owner_id).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn test_reserve_exact_fit() {
        let (db, owner_id) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        // storage_used + delta == max_storage is allowed
        ledger.reserve(owner_id, 1000).await.unwrap();
        assert_eq!(ledger.used(owner_id).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_reserve_over_quota_leaves_counter_unchanged() {
        let (db, owner_id) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        ledger.reserve(owner_id, 600).await.unwrap();

        let result = ledger.reserve(owner_id, 500).await;
        assert!(matches!(result, Err(CirrusError::QuotaExceeded(_))));
        assert_eq!(ledger.used(owner_id).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn test_reserve_unknown_owner() {
        let (db, _) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        let result = ledger.reserve(9999, 10).await;
        assert!(matches!(result, Err(CirrusError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_release() {
        let (db, owner_id) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        ledger.reserve(owner_id, 600).await.unwrap();
        ledger.release(owner_id, 600).await.unwrap();
        assert_eq!(ledger.used(owner_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_floors_at_zero() {
        let (db, owner_id) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        ledger.reserve(owner_id, 100).await.unwrap();
        ledger.release(owner_id, 500).await.unwrap();
        assert_eq!(ledger.used(owner_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_used_unknown_owner() {
        let (db, _) = setup(1000).await;
        let ledger = QuotaLedger::new(db.pool());

        assert!(matches!(
            ledger.used(9999).await,
            Err(CirrusError::NotFound(_))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(DEFAULT_MAX_STORAGE), "10.00 GB");
    }
}
