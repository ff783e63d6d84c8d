//! Command implementations.

pub mod link;
pub mod runs;
pub mod tag;

use std::path::Path;

use anyhow::{bail, Context, Result};

use filament_sqlite::{SqliteCacheStore, SqliteConfig};

use crate::config;

/// Open the vault database, creating the cache directory on first use.
pub(crate) fn open_store(vault: &Path) -> Result<SqliteCacheStore> {
    let db_path = config::database_path(vault);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteCacheStore::open(SqliteConfig::new(&db_path))
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Open the vault database for inspection; it must already exist.
pub(crate) fn open_existing_store(vault: &Path) -> Result<SqliteCacheStore> {
    let db_path = config::database_path(vault);
    if !db_path.exists() {
        bail!(
            "No database at {} (run a link or tag command first)",
            db_path.display()
        );
    }
    SqliteCacheStore::open(SqliteConfig::new(&db_path))
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}
