//! Shared helpers for integration tests.

use std::sync::Once;

use tempfile::TempDir;

use cirrus::db::NewOwner;
use cirrus::{Database, FileStorage, OwnerRepository};

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing once for the whole test binary.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        cirrus::logging::init_console_only("warn");
    });
}

/// A file-backed database plus a storage root, both inside temp dirs.
///
/// File-backed (rather than in-memory) so the pool can hand out more
/// than one connection, which the concurrency tests depend on.
pub struct TestEnv {
    pub db: Database,
    pub storage: FileStorage,
    _dirs: (TempDir, TempDir),
}

impl TestEnv {
    pub async fn new() -> Self {
        init_logging();
        let db_dir = TempDir::new().unwrap();
        let storage_dir = TempDir::new().unwrap();
        let db = Database::open(db_dir.path().join("test.db")).await.unwrap();
        let storage = FileStorage::new(storage_dir.path()).unwrap();
        Self {
            db,
            storage,
            _dirs: (db_dir, storage_dir),
        }
    }

    /// Create an owner with the given quota and return its ID.
    pub async fn create_owner(&self, name: &str, max_storage: i64) -> i64 {
        OwnerRepository::new(self.db.pool())
            .create(&NewOwner::new(name).with_max_storage(max_storage))
            .await
            .unwrap()
            .id
    }
}
