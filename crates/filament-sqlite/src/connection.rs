//! SQLite connection management.
//!
//! Uses a simple Arc<Mutex<Connection>> pattern rather than a pooling crate;
//! the cache is single-writer-per-process, so one guarded connection is all
//! the concurrency the workload has.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use crate::schema;

/// Thread-safe SQLite connection wrapper.
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    config: SqliteConfig,
}

impl SqlitePool {
    /// Open (creating if necessary) the database at the configured path and
    /// bring its schema up to date.
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        debug!(path = ?config.path, "opening sqlite cache");

        let conn = if config.path.to_str() == Some(":memory:") {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::Connection(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
            Connection::open(&config.path)?
        };

        let pool = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        pool.initialize()?;
        Ok(pool)
    }

    /// In-memory pool for testing.
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    /// Execute a closure with the connection.
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure with mutable access, needed for transactions.
    pub fn with_connection_mut<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    fn initialize(&self) -> SqliteResult<()> {
        self.with_connection(|conn| {
            self.configure_pragmas(conn)?;
            schema::apply_migrations(conn)?;
            info!(path = ?self.config.path, "sqlite cache ready");
            Ok(())
        })
    }

    fn configure_pragmas(&self, conn: &Connection) -> SqliteResult<()> {
        if self.config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        }
        if self.config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};",
            self.config.busy_timeout_ms
        ))?;
        conn.execute_batch(&format!("PRAGMA cache_size = {};", self.config.cache_size))?;
        Ok(())
    }
}
