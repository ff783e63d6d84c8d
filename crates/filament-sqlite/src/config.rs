//! Connection configuration.

use std::path::{Path, PathBuf};

/// Tuning knobs for a [`SqlitePool`](crate::connection::SqlitePool).
///
/// The defaults suit the single-writer cache workload: WAL keeps readers
/// unblocked during a refresh pass, and the busy timeout covers the rare
/// overlap with another process inspecting the database.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path, or `:memory:` for an in-memory database.
    pub path: PathBuf,
    /// Enable WAL journal mode with NORMAL synchronous.
    pub wal_mode: bool,
    /// Enforce foreign keys (the embedding table cascades from metadata).
    pub foreign_keys: bool,
    pub busy_timeout_ms: u32,
    /// Page cache size in KiB (negative per SQLite convention).
    pub cache_size: i64,
}

impl SqliteConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: 5000,
            cache_size: -8000,
        }
    }

    /// In-memory configuration for tests.
    pub fn memory() -> Self {
        let mut config = Self::new(":memory:");
        // WAL requires a file; in-memory databases fall back anyway.
        config.wal_mode = false;
        config
    }
}
