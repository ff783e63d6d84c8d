//! One-time import of the legacy flat-file embedding cache.
//!
//! Earlier releases persisted one binary file per (vault, model) holding
//! three parallel arrays. The import runs at store-open time, guarded by a
//! marker in the metadata table, and archives the file afterwards so it is
//! read exactly once. A corrupt or unreadable file is never fatal; the cache
//! simply starts empty and the next run re-embeds everything.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use filament_core::{CacheStore, DocumentRecord, StoreResult};

/// Container format of the legacy cache file.
#[derive(Debug, Serialize, Deserialize)]
struct LegacyCache {
    paths: Vec<String>,
    content_hashes: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl LegacyCache {
    fn is_consistent(&self) -> bool {
        self.paths.len() == self.content_hashes.len()
            && self.paths.len() == self.embeddings.len()
    }
}

fn marker_key(model: &str) -> String {
    format!("legacy_import:{model}")
}

fn archive(path: &Path) {
    let mut archived = path.as_os_str().to_owned();
    archived.push(".migrated");
    if let Err(err) = std::fs::rename(path, &archived) {
        warn!(path = %path.display(), error = %err, "failed to archive legacy cache");
    }
}

/// Import `legacy_path` into the store for `model`, once.
///
/// Returns the number of records imported; 0 when the import already ran,
/// the file is absent, or it could not be decoded. Imported records carry
/// `mtime_ns` 0, so the first detection pass after migration verifies each
/// document by hash and settles the real mtime without re-embedding.
pub fn migrate_legacy_cache(
    store: &dyn CacheStore,
    legacy_path: &Path,
    model: &str,
) -> StoreResult<usize> {
    let marker = marker_key(model);
    if store.get_meta(&marker)?.is_some() {
        debug!(model, "legacy cache already imported");
        return Ok(0);
    }

    if !legacy_path.exists() {
        store.set_meta(&marker, "absent")?;
        return Ok(0);
    }

    let bytes = match std::fs::read(legacy_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %legacy_path.display(), error = %err, "legacy cache unreadable, starting fresh");
            store.set_meta(&marker, "unreadable")?;
            return Ok(0);
        }
    };

    let cache: LegacyCache =
        match bincode::serde::decode_from_slice(&bytes, bincode::config::standard()) {
            Ok((cache, _)) => cache,
            Err(err) => {
                warn!(path = %legacy_path.display(), error = %err, "legacy cache corrupt, starting fresh");
                archive(legacy_path);
                store.set_meta(&marker, "corrupt")?;
                return Ok(0);
            }
        };

    if !cache.is_consistent() {
        warn!(
            path = %legacy_path.display(),
            paths = cache.paths.len(),
            hashes = cache.content_hashes.len(),
            vectors = cache.embeddings.len(),
            "legacy cache arrays disagree, starting fresh"
        );
        archive(legacy_path);
        store.set_meta(&marker, "corrupt")?;
        return Ok(0);
    }

    let mut imported = 0;
    for ((path, hash), vector) in cache
        .paths
        .iter()
        .zip(&cache.content_hashes)
        .zip(&cache.embeddings)
    {
        let record = DocumentRecord {
            path: path.clone(),
            content_hash: hash.clone(),
            mtime_ns: 0,
            size_bytes: 0,
            model: model.to_string(),
            dimensions: vector.len(),
            updated_at: Utc::now(),
        };
        store.upsert_document(&record, vector)?;
        imported += 1;
    }

    archive(legacy_path);
    store.set_meta(&marker, &format!("imported:{imported}"))?;
    info!(imported, path = %legacy_path.display(), "imported legacy embedding cache");
    Ok(imported)
}
