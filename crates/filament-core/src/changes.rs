//! Two-phase change detection.
//!
//! Phase one fetches the full persisted path set for the model in a single
//! query and compares filesystem modification times, which classifies the
//! common untouched document without reading it. Phase two hashes only the
//! documents whose mtime moved, so a metadata touch, copy, or checkout that
//! left content identical stays `unchanged` and costs one read instead of
//! one embedding call.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use crate::error::{HashError, StoreResult};
use crate::hashing::{read_document, ContentMode};
use crate::store::CacheStore;
use crate::types::ChangeSet;

/// Filesystem modification time in nanoseconds since the epoch.
pub fn modification_time_ns(path: &Path) -> Result<i64, HashError> {
    let metadata = std::fs::metadata(path).map_err(|source| HashError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = metadata.modified().map_err(|source| HashError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok(nanos)
}

/// Classify `current` against the store for `model`.
///
/// Every input path lands in exactly one of new/modified/unchanged;
/// `deleted` holds persisted paths missing from the input. A document that
/// cannot be statted or read degrades to `modified` so the embedding pass
/// makes the call on whether it still exists; detection itself never fails
/// on a single document.
pub fn detect_changes(
    current: &[PathBuf],
    store: &dyn CacheStore,
    model: &str,
    mode: ContentMode,
) -> StoreResult<ChangeSet> {
    let mut changes = ChangeSet::default();

    let known: HashSet<String> = store.document_paths(model)?.into_iter().collect();

    for path in current {
        let key = path.to_string_lossy();
        if !known.contains(key.as_ref()) {
            changes.new.push(path.clone());
            continue;
        }

        let mtime_ns = match modification_time_ns(path) {
            Ok(mtime_ns) => mtime_ns,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "stat failed, treating as modified");
                changes.modified.push(path.clone());
                continue;
            }
        };

        let record = match store.document(&key, model)? {
            Some(record) => record,
            None => {
                // Listed a moment ago but gone now; re-embed to be safe.
                changes.modified.push(path.clone());
                continue;
            }
        };

        if record.mtime_ns == mtime_ns {
            changes.unchanged.push(path.clone());
            continue;
        }

        match read_document(path, mode) {
            Ok(doc) if doc.content_hash == record.content_hash => {
                // Touched but identical. Refresh the stored mtime so the
                // next run takes the fast path again.
                if let Err(err) = store.refresh_mtime(&key, model, mtime_ns) {
                    debug!(path = %path.display(), error = %err, "mtime refresh failed");
                }
                changes.unchanged.push(path.clone());
            }
            Ok(_) => changes.modified.push(path.clone()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "read failed, treating as modified");
                changes.modified.push(path.clone());
            }
        }
    }

    // Key with the same lossy conversion the classification loop and the
    // store writes use, so a non-UTF-8 filename maps to one key everywhere.
    let current_set: HashSet<String> = current
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let mut deleted: Vec<PathBuf> = known
        .iter()
        .filter(|path| !current_set.contains(path.as_str()))
        .map(PathBuf::from)
        .collect();
    deleted.sort();
    changes.deleted = deleted;

    Ok(changes)
}
