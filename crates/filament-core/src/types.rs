//! Persisted record types and the change-detection result set.
//!
//! Every entity the store holds is a tagged struct here rather than a loose
//! key-value map, so schema drift shows up as a compile error instead of a
//! missing-key surprise at runtime.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cache state for one (document path, embedding model) pair.
///
/// `content_hash` is the authoritative staleness signal; `mtime_ns` is the
/// cheap proxy consulted first. The associated vector lives in a companion
/// blob table and is always written in the same transaction as this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identifier within the vault root.
    pub path: String,
    /// SHA-256 hex digest of the embedded text.
    pub content_hash: String,
    /// Filesystem modification time in nanoseconds since the epoch.
    pub mtime_ns: i64,
    /// Size at hash time. Informational, never used for invalidation.
    pub size_bytes: u64,
    /// Identity of the embedding model that produced the vector.
    pub model: String,
    /// Length of the associated vector.
    pub dimensions: usize,
    /// Last write to this record. Diagnostics only.
    pub updated_at: DateTime<Utc>,
}

/// Cached embedding for a tag's description text, keyed by (tag, model).
///
/// Invalidated independently from document records: the vector is reused as
/// long as the description hash and model both match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEmbeddingRecord {
    pub tag: String,
    /// The description text the vector was computed from.
    pub description: String,
    /// SHA-256 hex digest of `description`.
    pub content_hash: String,
    pub model: String,
    pub embedding: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

/// Terminal and transient states of a tool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    /// Completed, but some documents were skipped or some writes failed.
    Partial,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(RunStatus::InProgress),
            "success" => Some(RunStatus::Success),
            "partial" => Some(RunStatus::Partial),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

/// Append-only log entry for one tool invocation.
///
/// Written once with status `in_progress`, finalized exactly once with a
/// terminal status, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub operation: String,
    pub vault_path: String,
    pub files_total: usize,
    pub files_new: usize,
    pub files_modified: usize,
    pub files_unchanged: usize,
    pub files_deleted: usize,
    pub links_added: usize,
    pub links_removed: usize,
    pub tags_applied: usize,
    pub tags_removed: usize,
    /// Invocation parameters serialized as JSON, for later inspection.
    pub parameters: Option<String>,
    pub duration_seconds: Option<f64>,
    pub embedding_seconds: Option<f64>,
    /// unchanged / total, the fraction of documents served from cache.
    pub cache_hit_ratio: Option<f64>,
    pub status: RunStatus,
    pub error_count: usize,
    pub error_message: Option<String>,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
}

impl RunRecord {
    /// Fresh in-progress record with zeroed counters.
    pub fn started(tool: &str, operation: &str, vault_path: &str) -> Self {
        Self {
            run_id: String::new(),
            timestamp: Utc::now(),
            tool: tool.to_string(),
            operation: operation.to_string(),
            vault_path: vault_path.to_string(),
            files_total: 0,
            files_new: 0,
            files_modified: 0,
            files_unchanged: 0,
            files_deleted: 0,
            links_added: 0,
            links_removed: 0,
            tags_applied: 0,
            tags_removed: 0,
            parameters: None,
            duration_seconds: None,
            embedding_seconds: None,
            cache_hit_ratio: None,
            status: RunStatus::InProgress,
            error_count: 0,
            error_message: None,
            model: None,
            dimensions: None,
        }
    }
}

/// Classification of a document snapshot against persisted state.
///
/// `new`, `modified`, and `unchanged` partition the input set; `deleted`
/// holds persisted paths absent from the input. Built fresh on every
/// cache-refresh pass and discarded after use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub new: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Documents that need a fresh embedding this run.
    pub fn needs_embedding(&self) -> usize {
        self.new.len() + self.modified.len()
    }

    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.modified.is_empty() || !self.deleted.is_empty()
    }

    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            new: self.new.len(),
            modified: self.modified.len(),
            unchanged: self.unchanged.len(),
            deleted: self.deleted.len(),
        }
    }
}

/// Per-classification counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl ChangeStats {
    /// Total documents considered, not counting deletions.
    pub fn total(&self) -> usize {
        self.new + self.modified + self.unchanged
    }

    /// Fraction of documents served from cache, `None` for an empty run.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            None
        } else {
            Some(self.unchanged as f64 / total as f64)
        }
    }
}
