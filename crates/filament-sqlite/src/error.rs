//! Error types for the SQLite cache store.

use thiserror::Error;

use filament_core::StoreError;

#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema/migration error
    #[error("schema error: {0}")]
    Schema(String),

    /// Persisted bytes could not be decoded
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Underlying rusqlite error
    #[error("sqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(msg) => Self::Backend(msg),
            SqliteError::Schema(msg) => Self::Backend(msg),
            SqliteError::Corrupt(msg) => Self::Corrupt(msg),
            SqliteError::Rusqlite(e) => Self::Backend(e.to_string()),
        }
    }
}
