//! SQLite storage backend for Filament.
//!
//! Implements the [`CacheStore`](filament_core::CacheStore) trait over a
//! single WAL-mode database file per vault, and carries the one-time import
//! of the legacy flat-file embedding cache.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filament_sqlite::{SqliteCacheStore, SqliteConfig};
//!
//! let store = SqliteCacheStore::open(SqliteConfig::new("vault/.filament/filament.db"))?;
//! let record = store.document("notes/example.md", "nomic-embed-text")?;
//! ```

pub mod blob;
pub mod config;
pub mod connection;
pub mod error;
pub mod legacy;
pub mod schema;
pub mod store;

pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use legacy::migrate_legacy_cache;
pub use store::SqliteCacheStore;
