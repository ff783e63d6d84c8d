//! The embedding cache manager.
//!
//! [`EmbeddingCache::resolve`] is the one entry point: hand it the
//! documents discovered this run and it returns one vector per readable
//! document, reusing persisted vectors for everything the change detector
//! classified as unchanged and calling the provider only for the rest.
//! Results are persisted batch by batch, so an interrupted run loses at
//! most one batch of work.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use filament_core::{
    detect_changes, modification_time_ns, read_document, CacheStore, ChangeSet, ChangeStats,
    ContentMode, DocumentRecord,
};
use filament_embed::EmbeddingProvider;

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Vectors for one run, aligned with the surviving document list.
#[derive(Debug, Clone)]
pub struct ResolvedEmbeddings {
    /// Documents that produced a vector, in input order.
    pub documents: Vec<PathBuf>,
    /// One vector per surviving document.
    pub embeddings: Vec<Vec<f32>>,
    pub stats: ChangeStats,
    /// Documents dropped because they could not be read.
    pub failed_reads: usize,
    /// Wall-clock time spent inside provider calls.
    pub embed_seconds: f64,
}

/// Incremental embedding resolution over a [`CacheStore`].
pub struct EmbeddingCache<'a> {
    store: &'a dyn CacheStore,
    provider: &'a dyn EmbeddingProvider,
    mode: ContentMode,
    batch_size: usize,
}

struct Pending {
    entry_index: usize,
    content_hash: String,
}

impl<'a> EmbeddingCache<'a> {
    pub fn new(store: &'a dyn CacheStore, provider: &'a dyn EmbeddingProvider) -> Self {
        Self {
            store,
            provider,
            mode: ContentMode::Body,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: ContentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Cache key for this provider and content mode. Excerpt vectors are
    /// stored under a derived identity so they never collide with
    /// full-body vectors for the same model.
    pub fn model_identity(&self) -> String {
        format!("{}{}", self.provider.model(), self.mode.identity_suffix())
    }

    /// Produce a vector for every readable document, embedding only what
    /// changed since the last run. With `force`, persisted state for the
    /// model is cleared first and everything is re-embedded.
    pub fn resolve(&self, documents: &[PathBuf], force: bool) -> PipelineResult<ResolvedEmbeddings> {
        let model = self.model_identity();

        let changes = if force {
            let purged = self.store.clear_model(&model)?;
            info!(purged, model = %model, "forced rebuild, cleared cached embeddings");
            ChangeSet {
                new: documents.to_vec(),
                ..ChangeSet::default()
            }
        } else {
            detect_changes(documents, self.store, &model, self.mode)?
        };
        let stats = changes.stats();
        debug!(
            new = stats.new,
            modified = stats.modified,
            unchanged = stats.unchanged,
            deleted = stats.deleted,
            model = %model,
            "change detection complete"
        );

        for path in &changes.deleted {
            if let Err(err) = self
                .store
                .remove_document(&path.to_string_lossy(), &model)
            {
                warn!(path = %path.display(), error = %err, "failed to purge deleted document");
            }
        }

        let unchanged: HashSet<&Path> = changes.unchanged.iter().map(PathBuf::as_path).collect();

        let mut entries: Vec<(PathBuf, Option<Vec<f32>>)> = Vec::with_capacity(documents.len());
        let mut pending: Vec<Pending> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut failed_reads = 0usize;

        for path in documents {
            if unchanged.contains(path.as_path()) {
                match self.store.embedding(&path.to_string_lossy(), &model) {
                    Ok(Some(vector)) if !vector.is_empty() => {
                        entries.push((path.clone(), Some(vector)));
                        continue;
                    }
                    // An empty blob is as good as a missing one.
                    Ok(_) => {
                        debug!(path = %path.display(), "cached record has no usable vector, re-embedding")
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to load cached vector, re-embedding")
                    }
                }
            }

            match read_document(path, self.mode) {
                Ok(doc) => {
                    pending.push(Pending {
                        entry_index: entries.len(),
                        content_hash: doc.content_hash,
                    });
                    texts.push(doc.text);
                    entries.push((path.clone(), None));
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable document");
                    failed_reads += 1;
                }
            }
        }

        let mut committed = 0usize;
        let mut embed_seconds = 0.0f64;

        if !pending.is_empty() {
            info!(count = pending.len(), model = %model, "embedding changed documents");
        }

        for (batch_index, batch_texts) in texts.chunks(self.batch_size).enumerate() {
            let start = batch_index * self.batch_size;

            let timer = Instant::now();
            let vectors = self
                .provider
                .embed(batch_texts)
                .map_err(|source| PipelineError::Embedding { committed, source })?;
            embed_seconds += timer.elapsed().as_secs_f64();
            debug_assert_eq!(vectors.len(), batch_texts.len());

            for (offset, vector) in vectors.into_iter().enumerate() {
                let item = &pending[start + offset];
                let (path, slot) = &mut entries[item.entry_index];

                let record = DocumentRecord {
                    path: path.to_string_lossy().into_owned(),
                    content_hash: item.content_hash.clone(),
                    // A failed stat leaves a zero mtime, which forces hash
                    // verification on the next run.
                    mtime_ns: modification_time_ns(path).unwrap_or(0),
                    size_bytes: std::fs::metadata(path.as_path()).map(|m| m.len()).unwrap_or(0),
                    model: model.clone(),
                    dimensions: vector.len(),
                    updated_at: Utc::now(),
                };

                match self.store.upsert_document(&record, &vector) {
                    Ok(()) => committed += 1,
                    Err(err) => warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to persist embedding, continuing in memory"
                    ),
                }
                *slot = Some(vector);
            }
        }

        let mut out_documents = Vec::with_capacity(entries.len());
        let mut out_embeddings = Vec::with_capacity(entries.len());
        for (path, slot) in entries {
            if let Some(vector) = slot {
                out_documents.push(path);
                out_embeddings.push(vector);
            }
        }

        Ok(ResolvedEmbeddings {
            documents: out_documents,
            embeddings: out_embeddings,
            stats,
            failed_reads,
            embed_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_core::MemoryStore;
    use filament_embed::{EmbeddingError, EmbeddingResult, MockProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_note(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_first_run_embeds_everything() {
        let dir = tempfile::tempdir().unwrap();
        let notes = vec![
            write_note(dir.path(), "a.md", "alpha"),
            write_note(dir.path(), "b.md", "beta"),
        ];
        let store = MemoryStore::new();
        let provider = MockProvider::new();

        let cache = EmbeddingCache::new(&store, &provider);
        let resolved = cache.resolve(&notes, false).unwrap();

        assert_eq!(resolved.documents, notes);
        assert_eq!(resolved.embeddings.len(), 2);
        assert_eq!(resolved.stats.new, 2);
        assert_eq!(provider.embedded_count(), 2);
    }

    #[test]
    fn test_second_run_embeds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let notes = vec![
            write_note(dir.path(), "a.md", "alpha"),
            write_note(dir.path(), "b.md", "beta"),
        ];
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        let first = cache.resolve(&notes, false).unwrap();
        let second = cache.resolve(&notes, false).unwrap();

        assert_eq!(provider.embedded_count(), 2);
        assert_eq!(second.stats.unchanged, 2);
        assert_eq!(second.stats.new, 0);
        assert_eq!(first.documents, second.documents);
        assert_eq!(first.embeddings, second.embeddings);
    }

    #[test]
    fn test_modified_document_re_embedded_alone() {
        let dir = tempfile::tempdir().unwrap();
        let kept = write_note(dir.path(), "kept.md", "kept");
        let edited = write_note(dir.path(), "edited.md", "before");
        let notes = vec![kept, edited.clone()];
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        cache.resolve(&notes, false).unwrap();
        assert_eq!(provider.embedded_count(), 2);

        std::fs::write(&edited, "after").unwrap();
        // Make the stored mtime stale so detection falls through to the
        // hash comparison regardless of filesystem timestamp granularity.
        store
            .refresh_mtime(&edited.to_string_lossy(), &cache.model_identity(), 7)
            .unwrap();

        let resolved = cache.resolve(&notes, false).unwrap();
        assert_eq!(resolved.stats.modified, 1);
        assert_eq!(resolved.stats.unchanged, 1);
        assert_eq!(provider.embedded_count(), 3);
        assert_eq!(provider.embedded_texts().last().map(String::as_str), Some("after"));
    }

    #[test]
    fn test_deleted_document_purged_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let kept = write_note(dir.path(), "kept.md", "kept");
        let gone = write_note(dir.path(), "gone.md", "gone");
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        cache.resolve(&[kept.clone(), gone.clone()], false).unwrap();
        std::fs::remove_file(&gone).unwrap();

        let resolved = cache.resolve(&[kept], false).unwrap();
        assert_eq!(resolved.stats.deleted, 1);
        let record = store
            .document(&gone.to_string_lossy(), &cache.model_identity())
            .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_force_clears_and_re_embeds() {
        let dir = tempfile::tempdir().unwrap();
        let notes = vec![write_note(dir.path(), "a.md", "alpha")];
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        cache.resolve(&notes, false).unwrap();
        let resolved = cache.resolve(&notes, true).unwrap();

        assert_eq!(resolved.stats.new, 1);
        assert_eq!(resolved.stats.unchanged, 0);
        assert_eq!(provider.embedded_count(), 2);
    }

    #[test]
    fn test_unreadable_document_excluded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let readable = write_note(dir.path(), "ok.md", "fine");
        let missing = dir.path().join("missing.md");
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        let resolved = cache.resolve(&[readable.clone(), missing], false).unwrap();

        assert_eq!(resolved.documents, vec![readable]);
        assert_eq!(resolved.embeddings.len(), 1);
        assert_eq!(resolved.failed_reads, 1);
    }

    #[test]
    fn test_unusable_cached_vector_is_re_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let note = write_note(dir.path(), "a.md", "alpha");
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        cache.resolve(&[note.clone()], false).unwrap();
        assert_eq!(provider.embedded_count(), 1);

        // Clobber the stored vector while keeping the metadata record.
        let model = cache.model_identity();
        let record = store.document(&note.to_string_lossy(), &model).unwrap().unwrap();
        store.upsert_document(&record, &[]).unwrap();

        let resolved = cache.resolve(&[note], false).unwrap();
        assert_eq!(resolved.embeddings.len(), 1);
        assert!(!resolved.embeddings[0].is_empty());
        assert_eq!(provider.embedded_count(), 2);
    }

    #[test]
    fn test_excerpt_mode_uses_derived_identity() {
        let dir = tempfile::tempdir().unwrap();
        let content = "body\n<!-- AUTO-GENERATED SUMMARY START -->\ngist\n<!-- AUTO-GENERATED SUMMARY END -->";
        let note = write_note(dir.path(), "a.md", content);
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider).with_mode(ContentMode::Excerpt);

        assert_eq!(cache.model_identity(), "mock-embedder#summary");
        cache.resolve(&[note.clone()], false).unwrap();

        assert_eq!(provider.embedded_texts(), vec!["gist"]);
        let record = store
            .document(&note.to_string_lossy(), "mock-embedder#summary")
            .unwrap();
        assert!(record.is_some());
        let body_record = store.document(&note.to_string_lossy(), "mock-embedder").unwrap();
        assert!(body_record.is_none());
    }

    #[test]
    fn test_output_preserves_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let c = write_note(dir.path(), "c.md", "gamma");
        let a = write_note(dir.path(), "a.md", "alpha");
        let b = write_note(dir.path(), "b.md", "beta");
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let cache = EmbeddingCache::new(&store, &provider);

        // Mix cached and fresh entries across the order.
        cache.resolve(&[a.clone()], false).unwrap();
        let input = vec![c.clone(), a.clone(), b.clone()];
        let resolved = cache.resolve(&input, false).unwrap();

        assert_eq!(resolved.documents, input);
    }

    struct FlakyProvider {
        inner: MockProvider,
        fail_from_call: usize,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(fail_from_call: usize) -> Self {
            Self {
                inner: MockProvider::new(),
                fail_from_call,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingProvider for FlakyProvider {
        fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from_call {
                return Err(EmbeddingError::Http("connection refused".to_string()));
            }
            self.inner.embed(texts)
        }

        fn model(&self) -> &str {
            self.inner.model()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    #[test]
    fn test_embed_failure_reports_committed_count() {
        let dir = tempfile::tempdir().unwrap();
        let notes = vec![
            write_note(dir.path(), "a.md", "alpha"),
            write_note(dir.path(), "b.md", "beta"),
        ];
        let store = MemoryStore::new();
        let provider = FlakyProvider::new(1);
        let cache = EmbeddingCache::new(&store, &provider).with_batch_size(1);

        let err = cache.resolve(&notes, false).unwrap_err();
        match err {
            PipelineError::Embedding { committed, .. } => assert_eq!(committed, 1),
            other => panic!("unexpected error: {other}"),
        }

        // The first batch survived, so the next run only embeds the rest.
        let record = store
            .document(&notes[0].to_string_lossy(), "mock-embedder")
            .unwrap();
        assert!(record.is_some());
    }

    #[test]
    fn test_batching_respects_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let notes: Vec<PathBuf> = (0..5)
            .map(|i| write_note(dir.path(), &format!("n{i}.md"), &format!("note {i}")))
            .collect();
        let store = MemoryStore::new();
        let provider = FlakyProvider::new(usize::MAX);
        let cache = EmbeddingCache::new(&store, &provider).with_batch_size(2);

        cache.resolve(&notes, false).unwrap();
        // 5 documents in batches of 2 means 3 provider calls.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
