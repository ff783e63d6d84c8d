//! The `tag` command: match each document against tag descriptions and
//! keep the winning tag in its front matter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use filament_core::{CacheStore, RunStatus};
use filament_embed::{create_provider, EmbeddingProvider};
use filament_pipeline::{
    assign_tags, load_tag_definitions, resolve_tag_embeddings, EmbeddingCache, PipelineError,
    RunLogger, TagDefinition,
};
use filament_sqlite::migrate_legacy_cache;

use crate::config::{self, CliConfig};
use crate::discovery;
use crate::markdown;

pub fn execute(
    config: &CliConfig,
    vault: Option<PathBuf>,
    tags_file: Option<PathBuf>,
    apply: bool,
    remove: bool,
    batch_size: Option<usize>,
    force: bool,
) -> Result<()> {
    let vault = config.resolve_vault(vault.as_deref())?;
    let documents = discovery::discover_documents(&vault);
    info!("Scanning {} markdown files...", documents.len());

    if remove {
        return remove_all_tags(&vault, &documents);
    }

    let Some(tags_file) = tags_file else {
        bail!("--tags-file is required unless --remove is given");
    };
    let tags = load_tag_definitions(&tags_file)?;
    if tags.is_empty() {
        bail!("no tag definitions in {}", tags_file.display());
    }

    let store = super::open_store(&vault)?;
    let provider = create_provider(&config.embed_config())?;
    let legacy = config::legacy_cache_path(&vault, provider.model());
    if let Err(err) = migrate_legacy_cache(&store, &legacy, provider.model()) {
        warn!(error = %err, "legacy cache import failed");
    }

    let batch_size = config.batch_size(batch_size);
    let operation = if apply { "apply" } else { "preview" };
    let mut logger = RunLogger::start(&store, "tagger", operation, &vault.to_string_lossy());
    logger.set_parameters(&serde_json::json!({
        "tags_file": tags_file.display().to_string(),
        "tag_count": tags.len(),
        "batch_size": batch_size,
        "force": force,
    }));

    let result = run_tag(
        &store,
        provider.as_ref(),
        &mut logger,
        &documents,
        &tags,
        batch_size,
        apply,
        force,
    );
    match result {
        Ok(()) => {
            logger.complete();
            Ok(())
        }
        Err(err) => {
            let partial = matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::Embedding { committed, .. }) if *committed > 0
            );
            if partial {
                logger.add_error(&err.to_string());
                logger.finish(RunStatus::Partial);
            } else {
                logger.finish_error(&err.to_string());
            }
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_tag(
    store: &dyn CacheStore,
    provider: &dyn EmbeddingProvider,
    logger: &mut RunLogger<'_>,
    documents: &[PathBuf],
    tags: &[TagDefinition],
    batch_size: usize,
    apply: bool,
    force: bool,
) -> Result<()> {
    let cache = EmbeddingCache::new(store, provider).with_batch_size(batch_size);
    let resolved = cache.resolve(documents, force)?;
    logger.apply_change_stats(&resolved.stats);
    logger.record_mut().embedding_seconds = Some(resolved.embed_seconds);
    if resolved.failed_reads > 0 {
        logger.add_error(&format!(
            "{} documents could not be read",
            resolved.failed_reads
        ));
    }
    let dimensions = resolved
        .embeddings
        .first()
        .map(Vec::len)
        .unwrap_or_else(|| provider.dimensions());
    logger.set_model(provider.model(), dimensions);

    if resolved.documents.is_empty() {
        println!("No documents to tag.");
        return Ok(());
    }

    let tag_vectors = resolve_tag_embeddings(store, provider, tags)?;
    let assignments = assign_tags(&resolved.embeddings, &tag_vectors);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &tag_index in &assignments {
        *counts.entry(tags[tag_index].name.as_str()).or_default() += 1;
    }
    println!("Tag distribution:");
    for tag in tags {
        let count = counts.get(tag.name.as_str()).copied().unwrap_or(0);
        println!("  {}: {} files", tag.name, count);
    }

    if !apply {
        println!("Preview only; re-run with --apply to write tags.");
        return Ok(());
    }

    let mut tagged = 0usize;
    for (path, &tag_index) in resolved.documents.iter().zip(&assignments) {
        match tag_file(path, &tags[tag_index].name) {
            Ok(true) => tagged += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to tag");
                logger.add_error(&format!("{}: {err}", path.display()));
            }
        }
    }
    logger.record_mut().tags_applied = tagged;
    println!("Applied tags to {tagged}/{} files.", resolved.documents.len());
    Ok(())
}

/// Put `tag` at the head of the document's tag list. Returns false when the
/// tag was already present.
fn tag_file(path: &Path, tag: &str) -> Result<bool> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match markdown::apply_front_matter_tag(&content, tag)? {
        Some(updated) => {
            std::fs::write(path, updated).with_context(|| format!("write {}", path.display()))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn remove_all_tags(vault: &Path, documents: &[PathBuf]) -> Result<()> {
    let store = super::open_store(vault)?;
    let mut logger = RunLogger::start(&store, "tagger", "remove", &vault.to_string_lossy());

    let mut removed = 0usize;
    for path in documents {
        match untag_file(path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove tags");
                logger.add_error(&format!("{}: {err}", path.display()));
            }
        }
    }
    logger.record_mut().tags_removed = removed;
    println!("Removed tags from {removed}/{} files.", documents.len());
    logger.complete();
    Ok(())
}

fn untag_file(path: &Path) -> Result<bool> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match markdown::remove_front_matter_tags(&content)? {
        Some(updated) => {
            std::fs::write(path, updated).with_context(|| format!("write {}", path.display()))?;
            Ok(true)
        }
        None => Ok(false),
    }
}
