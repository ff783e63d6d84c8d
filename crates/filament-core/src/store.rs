//! Storage abstraction for cache state.
//!
//! Backends implement [`CacheStore`]; everything above it (change detection,
//! the embedding cache, the CLI) takes a `&dyn CacheStore` so tests can run
//! against [`MemoryStore`](crate::memory::MemoryStore) while production uses
//! the SQLite backend. Each method is atomic with respect to a single call;
//! the store is single-writer-per-process by contract.

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{DocumentRecord, RunRecord, TagEmbeddingRecord};

/// Filter for run-log retrieval, newest first.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Only runs for this vault path.
    pub vault: Option<String>,
    /// Only runs recorded by this tool.
    pub tool: Option<String>,
    /// Maximum number of runs to return; 0 means no limit.
    pub limit: usize,
}

/// Retention criteria for run-log pruning.
///
/// `cutoff` and `keep_last` are alternatives; when both are set the cutoff
/// wins. With `dry_run` the store only counts what would be deleted.
#[derive(Debug, Clone, Default)]
pub struct RunPrune {
    pub cutoff: Option<DateTime<Utc>>,
    pub keep_last: Option<usize>,
    pub tool: Option<String>,
    pub dry_run: bool,
}

/// Durable cache state: document records with their vectors, tag
/// embeddings, run logs, and a small key-value table for bookkeeping.
pub trait CacheStore: Send + Sync {
    /// Look up the record for one (path, model) pair.
    fn document(&self, path: &str, model: &str) -> StoreResult<Option<DocumentRecord>>;

    /// All persisted paths for a model, one query. Sorted for determinism.
    fn document_paths(&self, model: &str) -> StoreResult<Vec<String>>;

    /// Insert-or-replace a record together with its vector.
    ///
    /// Metadata and vector must land in the same transaction so the pair can
    /// never diverge. Last writer wins.
    fn upsert_document(&self, record: &DocumentRecord, embedding: &[f32]) -> StoreResult<()>;

    /// Load the vector for one (path, model) pair.
    fn embedding(&self, path: &str, model: &str) -> StoreResult<Option<Vec<f32>>>;

    /// Drop a record and its vector. Removing a missing path is not an error.
    fn remove_document(&self, path: &str, model: &str) -> StoreResult<()>;

    /// Update only the stored modification time.
    ///
    /// Used when a document was touched but its content hash is unchanged,
    /// so the next run takes the mtime fast path again.
    fn refresh_mtime(&self, path: &str, model: &str, mtime_ns: i64) -> StoreResult<()>;

    /// Remove every document record for a model. Returns the count removed.
    fn clear_model(&self, model: &str) -> StoreResult<usize>;

    fn tag_embedding(&self, tag: &str, model: &str) -> StoreResult<Option<TagEmbeddingRecord>>;

    fn upsert_tag_embedding(&self, record: &TagEmbeddingRecord) -> StoreResult<()>;

    /// Append or finalize a run record (matched by `run_id`).
    fn record_run(&self, run: &RunRecord) -> StoreResult<()>;

    fn recent_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>>;

    /// Delete (or with `dry_run`, count) runs matching the criteria.
    fn prune_runs(&self, prune: &RunPrune) -> StoreResult<usize>;

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>>;

    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()>;
}
