//! Error types shared across the Filament crates.
//!
//! The taxonomy mirrors how failures are handled, not where they occur:
//! per-document I/O problems ([`HashError`]) exclude a single document from
//! the current run, store problems ([`StoreError`]) either propagate or
//! downgrade the run to a fresh-cache start, and the numeric engines report
//! shape problems that indicate a caller bug rather than bad user data.

use std::path::PathBuf;

use thiserror::Error;

/// A document could not be read or statted.
///
/// Callers treat this as "skip the document for this run"; it never aborts
/// a whole batch.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage backend failure, produced by any [`CacheStore`] implementation.
///
/// [`CacheStore`]: crate::store::CacheStore
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying engine rejected an operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Persisted data could not be decoded (wrong blob length, bad
    /// container). Treated as an empty cache by recovery paths.
    #[error("corrupt cache data: {0}")]
    Corrupt(String),

    /// A value could not be serialized for storage.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shape problems when building or combining similarity matrices.
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("cannot combine similarity matrices with shapes {first:?} and {other:?}")]
    ShapeMismatch {
        first: (usize, usize),
        other: (usize, usize),
    },

    #[error("embedding row {row} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("no similarity source with a positive weight")]
    NoSources,
}

/// Invalid clustering request.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster count must be at least 1")]
    ZeroClusters,

    #[error("cannot split {points} points into {clusters} clusters")]
    TooFewPoints { points: usize, clusters: usize },
}
