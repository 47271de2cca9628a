//! Database schema migrations for Cirrus.
//!
//! Each entry is applied once, in order, inside a transaction. The applied
//! version is tracked in the `schema_version` table.

/// All schema migrations, oldest first.
pub const MIGRATIONS: &[&str] = &[
    // v1: owners, folders, files
    r#"
    CREATE TABLE owners (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT NOT NULL UNIQUE,
        storage_used    INTEGER NOT NULL DEFAULT 0,
        max_storage     INTEGER NOT NULL,
        created_at      TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE folders (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT NOT NULL,
        owner_id        INTEGER NOT NULL REFERENCES owners(id),
        parent_id       INTEGER REFERENCES folders(id),
        created_at      TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_folders_owner ON folders(owner_id);
    CREATE INDEX idx_folders_owner_parent ON folders(owner_id, parent_id);

    CREATE TABLE files (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        stored_name     TEXT NOT NULL UNIQUE,
        original_name   TEXT NOT NULL,
        content_type    TEXT,
        size            INTEGER NOT NULL,
        storage_path    TEXT NOT NULL,
        checksum        TEXT,
        owner_id        INTEGER NOT NULL REFERENCES owners(id),
        folder_id       INTEGER REFERENCES folders(id),
        is_public       INTEGER NOT NULL DEFAULT 0,
        share_token     TEXT UNIQUE,
        download_count  INTEGER NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_files_owner ON files(owner_id);
    CREATE INDEX idx_files_owner_folder ON files(owner_id, folder_id);
    CREATE INDEX idx_files_share_token ON files(share_token);
    "#,
];
