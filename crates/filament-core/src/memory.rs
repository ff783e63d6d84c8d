//! In-memory [`CacheStore`] backend.
//!
//! Used by tests and by callers that want cache semantics without a file on
//! disk. Behavior matches the SQLite backend for everything the trait
//! promises, including sorted path listings and newest-first run queries.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::StoreResult;
use crate::store::{CacheStore, RunFilter, RunPrune};
use crate::types::{DocumentRecord, RunRecord, TagEmbeddingRecord};

#[derive(Default)]
struct Inner {
    documents: HashMap<(String, String), (DocumentRecord, Vec<f32>)>,
    tags: HashMap<(String, String), TagEmbeddingRecord>,
    runs: Vec<RunRecord>,
    meta: HashMap<String, String>,
}

/// HashMap-backed store guarded by a single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of document records across all models.
    pub fn document_count(&self) -> usize {
        self.inner.lock().documents.len()
    }
}

impl CacheStore for MemoryStore {
    fn document(&self, path: &str, model: &str) -> StoreResult<Option<DocumentRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .documents
            .get(&(path.to_string(), model.to_string()))
            .map(|(record, _)| record.clone()))
    }

    fn document_paths(&self, model: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock();
        let mut paths: Vec<String> = inner
            .documents
            .keys()
            .filter(|(_, m)| m == model)
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn upsert_document(&self, record: &DocumentRecord, embedding: &[f32]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.documents.insert(
            (record.path.clone(), record.model.clone()),
            (record.clone(), embedding.to_vec()),
        );
        Ok(())
    }

    fn embedding(&self, path: &str, model: &str) -> StoreResult<Option<Vec<f32>>> {
        let inner = self.inner.lock();
        Ok(inner
            .documents
            .get(&(path.to_string(), model.to_string()))
            .map(|(_, vector)| vector.clone()))
    }

    fn remove_document(&self, path: &str, model: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner
            .documents
            .remove(&(path.to_string(), model.to_string()));
        Ok(())
    }

    fn refresh_mtime(&self, path: &str, model: &str, mtime_ns: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some((record, _)) = inner
            .documents
            .get_mut(&(path.to_string(), model.to_string()))
        {
            record.mtime_ns = mtime_ns;
        }
        Ok(())
    }

    fn clear_model(&self, model: &str) -> StoreResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.documents.len();
        inner.documents.retain(|(_, m), _| m != model);
        Ok(before - inner.documents.len())
    }

    fn tag_embedding(&self, tag: &str, model: &str) -> StoreResult<Option<TagEmbeddingRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .tags
            .get(&(tag.to_string(), model.to_string()))
            .cloned())
    }

    fn upsert_tag_embedding(&self, record: &TagEmbeddingRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner
            .tags
            .insert((record.tag.clone(), record.model.clone()), record.clone());
        Ok(())
    }

    fn record_run(&self, run: &RunRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.runs.iter_mut().find(|r| r.run_id == run.run_id) {
            *existing = run.clone();
        } else {
            inner.runs.push(run.clone());
        }
        Ok(())
    }

    fn recent_runs(&self, filter: &RunFilter) -> StoreResult<Vec<RunRecord>> {
        let inner = self.inner.lock();
        let mut runs: Vec<RunRecord> = inner
            .runs
            .iter()
            .filter(|run| {
                filter
                    .vault
                    .as_ref()
                    .map_or(true, |vault| &run.vault_path == vault)
                    && filter.tool.as_ref().map_or(true, |tool| &run.tool == tool)
            })
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if filter.limit > 0 {
            runs.truncate(filter.limit);
        }
        Ok(runs)
    }

    fn prune_runs(&self, prune: &RunPrune) -> StoreResult<usize> {
        let mut inner = self.inner.lock();

        let matches_tool =
            |run: &RunRecord| prune.tool.as_ref().map_or(true, |tool| &run.tool == tool);

        let doomed: Vec<String> = if let Some(cutoff) = prune.cutoff {
            inner
                .runs
                .iter()
                .filter(|run| matches_tool(run) && run.timestamp < cutoff)
                .map(|run| run.run_id.clone())
                .collect()
        } else if let Some(keep) = prune.keep_last {
            let mut candidates: Vec<&RunRecord> =
                inner.runs.iter().filter(|run| matches_tool(run)).collect();
            candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            candidates
                .iter()
                .skip(keep)
                .map(|run| run.run_id.clone())
                .collect()
        } else {
            Vec::new()
        };

        if !prune.dry_run {
            inner.runs.retain(|run| !doomed.contains(&run.run_id));
        }
        Ok(doomed.len())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.lock().meta.get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner
            .lock()
            .meta
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
