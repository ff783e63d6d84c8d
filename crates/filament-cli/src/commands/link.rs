//! The `link` command: embed the vault, pick related documents, and manage
//! the generated link blocks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use filament_core::{
    combine_matrices, cosine_similarity_matrix, embedding_matrix, kmeans_labels, select_links,
    CacheStore, ContentMode, LinkOptions, RunStatus,
};
use filament_embed::{create_provider, EmbeddingProvider};
use filament_pipeline::{EmbeddingCache, PipelineError, RunLogger};
use filament_sqlite::migrate_legacy_cache;

use crate::config::{self, CliConfig};
use crate::discovery;
use crate::markdown;

/// Seed for cluster initialization, fixed so repeat runs agree.
const CLUSTER_SEED: u64 = 0;

pub struct LinkParams {
    pub options: LinkOptions,
    pub clusters: usize,
    pub summary_weight: f32,
    pub batch_size: usize,
    pub apply: bool,
    pub delete: bool,
    pub force: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &CliConfig,
    vault: Option<PathBuf>,
    similarity: Option<f32>,
    min_links: Option<usize>,
    max_links: Option<usize>,
    clusters: Option<usize>,
    summary_weight: Option<f32>,
    batch_size: Option<usize>,
    apply: bool,
    delete: bool,
    force: bool,
) -> Result<()> {
    let vault = config.resolve_vault(vault.as_deref())?;
    let params = LinkParams {
        options: LinkOptions {
            threshold: similarity.unwrap_or(config.linking.threshold),
            min_links: min_links.unwrap_or(config.linking.min_links),
            max_links: max_links.unwrap_or(config.linking.max_links),
        },
        clusters: clusters.unwrap_or(config.linking.clusters),
        summary_weight: summary_weight.unwrap_or(config.linking.summary_weight),
        batch_size: config.batch_size(batch_size),
        apply,
        delete,
        force,
    };

    let documents = discovery::discover_documents(&vault);
    info!("Scanning {} markdown files...", documents.len());

    // Deletion-only mode: strip blocks without touching the embedding stack.
    if params.delete && !params.apply {
        return delete_all_links(&vault, &documents);
    }

    let store = super::open_store(&vault)?;
    let provider = create_provider(&config.embed_config())?;
    let model = provider.model().to_string();
    let legacy = config::legacy_cache_path(&vault, &model);
    if let Err(err) = migrate_legacy_cache(&store, &legacy, &model) {
        warn!(error = %err, "legacy cache import failed");
    }

    let operation = if params.apply { "apply" } else { "preview" };
    let mut logger = RunLogger::start(&store, "linker", operation, &vault.to_string_lossy());
    logger.set_parameters(&serde_json::json!({
        "similarity": params.options.threshold,
        "min_links": params.options.min_links,
        "max_links": params.options.max_links,
        "clusters": params.clusters,
        "summary_weight": params.summary_weight,
        "batch_size": params.batch_size,
        "delete": params.delete,
        "force": params.force,
    }));

    let result = run_link(&store, provider.as_ref(), &mut logger, &documents, &params);
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

fn run_link(
    store: &dyn CacheStore,
    provider: &dyn EmbeddingProvider,
    logger: &mut RunLogger<'_>,
    documents: &[PathBuf],
    params: &LinkParams,
) -> Result<()> {
    let cache = EmbeddingCache::new(store, provider).with_batch_size(params.batch_size);
    let resolved = cache.resolve(documents, params.force)?;

    if !params.force {
        info!(
            "Change detection: {} new, {} modified, {} deleted, {} unchanged",
            resolved.stats.new,
            resolved.stats.modified,
            resolved.stats.deleted,
            resolved.stats.unchanged
        );
    }
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
        println!("No documents to link.");
        return Ok(());
    }

    let body_matrix = embedding_matrix(&resolved.embeddings)?;
    let labels = if params.clusters > 0 && resolved.documents.len() >= params.clusters {
        Some(kmeans_labels(&body_matrix, params.clusters, CLUSTER_SEED)?)
    } else {
        None
    };

    info!(
        "Computing similarity matrix ({} files)...",
        resolved.documents.len()
    );
    // A weight-0 source is never computed, not just skipped downstream.
    let body_weight = 1.0 - params.summary_weight;
    let mut sources = Vec::with_capacity(2);
    if body_weight > 0.0 {
        sources.push((cosine_similarity_matrix(&body_matrix), body_weight));
    }
    if params.summary_weight > 0.0 {
        let excerpt_cache = EmbeddingCache::new(store, provider)
            .with_mode(ContentMode::Excerpt)
            .with_batch_size(params.batch_size);
        let excerpts = excerpt_cache.resolve(&resolved.documents, params.force)?;
        if excerpts.documents == resolved.documents {
            let excerpt_matrix = embedding_matrix(&excerpts.embeddings)?;
            sources.push((
                cosine_similarity_matrix(&excerpt_matrix),
                params.summary_weight,
            ));
        } else {
            warn!("summary excerpts incomplete, falling back to body similarity");
            sources = vec![(cosine_similarity_matrix(&body_matrix), 1.0)];
        }
    }
    let matrix = combine_matrices(&sources)?;

    let total_pairs = matrix.len();
    let above = matrix
        .iter()
        .filter(|&&score| score >= params.options.threshold)
        .count();
    println!(
        "Threshold={}: {}/{} pairs ({:.2}%) above threshold",
        params.options.threshold,
        above,
        total_pairs,
        100.0 * above as f64 / total_pairs as f64
    );

    let names: Vec<String> = resolved
        .documents
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let links = select_links(&matrix, &names, &params.options, labels.as_deref());

    let mut distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for targets in links.values() {
        *distribution.entry(targets.len()).or_default() += 1;
    }
    println!("Link count distribution:");
    for count in params.options.min_links..=params.options.max_links {
        let files = distribution.get(&count).copied().unwrap_or(0);
        println!("  {files} files with {count} links");
    }
    if params.options.min_links > 0 {
        let zero = distribution.get(&0).copied().unwrap_or(0);
        if zero > 0 {
            println!("  {zero} files with 0 links (minimum not reachable, links cleared)");
        }
    }

    if !params.apply {
        println!("Preview only; re-run with --apply to write links.");
        return Ok(());
    }

    let mut modified = 0usize;
    let mut total_added = 0usize;
    let mut removed = 0usize;
    let mut errors = 0usize;
    for path in documents {
        let name = path.to_string_lossy();
        let targets = links
            .get(name.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();
        match modify_document(path, targets, params.delete) {
            Ok(ModifyOutcome::Updated(count)) => {
                modified += 1;
                total_added += count;
            }
            Ok(ModifyOutcome::Deleted) => removed += 1,
            Ok(ModifyOutcome::Unchanged) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to update links");
                logger.add_error(&format!("{}: {err}", path.display()));
                errors += 1;
            }
        }
    }
    logger.record_mut().links_added = total_added;
    logger.record_mut().links_removed = removed;
    println!("Files modified: {modified}, total links added: {total_added}, errors: {errors}");
    Ok(())
}

enum ModifyOutcome {
    Updated(usize),
    Deleted,
    Unchanged,
}

/// Rewrite one document's link block.
///
/// With `delete`, an existing block is stripped first; empty targets then
/// leave the document without one. A rewrite that would not change the file
/// is skipped entirely so the stored mtime stays valid.
fn modify_document(path: &Path, targets: &[String], delete: bool) -> Result<ModifyOutcome> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;

    let stems: BTreeSet<String> = targets
        .iter()
        .filter_map(|target| Path::new(target).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .collect();

    if delete && stems.is_empty() {
        return match markdown::remove_links_block(&content) {
            Some(updated) => {
                std::fs::write(path, updated)
                    .with_context(|| format!("write {}", path.display()))?;
                Ok(ModifyOutcome::Deleted)
            }
            None => Ok(ModifyOutcome::Unchanged),
        };
    }

    let mut working = content.clone();
    if delete {
        if let Some(stripped) = markdown::remove_links_block(&working) {
            working = stripped;
        }
    }
    if stems.is_empty() {
        return Ok(ModifyOutcome::Unchanged);
    }

    let block = markdown::render_links_block(&stems);
    let updated = markdown::upsert_links_block(&working, &block);
    if updated == content {
        return Ok(ModifyOutcome::Unchanged);
    }
    std::fs::write(path, &updated).with_context(|| format!("write {}", path.display()))?;
    Ok(ModifyOutcome::Updated(stems.len()))
}

fn delete_all_links(vault: &Path, documents: &[PathBuf]) -> Result<()> {
    let store = super::open_store(vault)?;
    let mut logger = RunLogger::start(&store, "linker", "remove", &vault.to_string_lossy());

    let mut removed = 0usize;
    for path in documents {
        match modify_document(path, &[], true) {
            Ok(ModifyOutcome::Deleted) => removed += 1,
            Ok(_) => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove links");
                logger.add_error(&format!("{}: {err}", path.display()));
            }
        }
    }
    logger.record_mut().links_removed = removed;
    println!("Removed link blocks from {removed}/{} files.", documents.len());
    logger.complete();
    Ok(())
}
