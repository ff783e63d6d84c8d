//! Schema management and migrations.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{SqliteError, SqliteResult};

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations.
pub fn apply_migrations(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version = current_version(conn)?;
    debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "checking migrations"
    );

    if current_version < SCHEMA_VERSION {
        info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "applying schema migrations"
        );
        apply_migration_v1(conn)?;
    }

    Ok(())
}

fn current_version(conn: &Connection) -> SqliteResult<i32> {
    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

fn record_migration(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version) VALUES (?)",
        [version],
    )?;
    Ok(())
}

fn apply_migration_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(SCHEMA_V1)
        .map_err(|e| SqliteError::Schema(format!("failed to apply v1 schema: {e}")))?;
    record_migration(conn, 1)?;
    Ok(())
}

/// Initial schema.
///
/// `file_metadata` is keyed by (path, model) so vaults embedded with more
/// than one model never clobber each other. Vectors live in the companion
/// `file_embeddings` table, written in the same transaction as the metadata
/// row and removed through the cascade.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS file_metadata (
    path TEXT NOT NULL,
    model TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    mtime_ns INTEGER NOT NULL,
    size_bytes INTEGER NOT NULL,
    dimensions INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (path, model)
);

CREATE INDEX IF NOT EXISTS idx_file_metadata_model ON file_metadata(model);

CREATE TABLE IF NOT EXISTS file_embeddings (
    path TEXT NOT NULL,
    model TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (path, model),
    FOREIGN KEY (path, model) REFERENCES file_metadata(path, model) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tag_embeddings (
    tag TEXT NOT NULL,
    model TEXT NOT NULL,
    description TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tag, model)
);

CREATE TABLE IF NOT EXISTS run_logs (
    run_id TEXT PRIMARY KEY NOT NULL,
    timestamp TEXT NOT NULL,
    tool TEXT NOT NULL,
    operation TEXT NOT NULL,
    vault_path TEXT NOT NULL,

    files_total INTEGER NOT NULL DEFAULT 0,
    files_new INTEGER NOT NULL DEFAULT 0,
    files_modified INTEGER NOT NULL DEFAULT 0,
    files_unchanged INTEGER NOT NULL DEFAULT 0,
    files_deleted INTEGER NOT NULL DEFAULT 0,

    links_added INTEGER NOT NULL DEFAULT 0,
    links_removed INTEGER NOT NULL DEFAULT 0,
    tags_applied INTEGER NOT NULL DEFAULT 0,
    tags_removed INTEGER NOT NULL DEFAULT 0,

    parameters TEXT,

    duration_seconds REAL,
    embedding_seconds REAL,
    cache_hit_ratio REAL,

    status TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,

    model TEXT,
    dimensions INTEGER
);

CREATE INDEX IF NOT EXISTS idx_run_logs_timestamp ON run_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_run_logs_tool ON run_logs(tool);
CREATE INDEX IF NOT EXISTS idx_run_logs_vault ON run_logs(vault_path);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;
