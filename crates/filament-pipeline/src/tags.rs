//! Tag definitions and tag-embedding resolution.
//!
//! Tags are declared in a plain text file, one `name::description` per
//! line. The description is what gets embedded; assignment is nearest
//! tag by cosine similarity. Tag vectors go through the same store as
//! document vectors and are re-embedded only when the description text
//! or the model changes.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use filament_core::{hash_text, CacheStore, TagEmbeddingRecord};
use filament_embed::EmbeddingProvider;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    pub name: String,
    pub description: String,
}

/// Separator between a tag name and its description.
const TAG_SEPARATOR: &str = "::";

/// Parse the tag-definitions format: one `name::description` per line,
/// `#` comments and blank lines ignored. Only the first separator splits,
/// so descriptions may contain `::`. A line without one declares a tag
/// described by its own name, as does an empty description. Repeating a
/// name keeps its first position but takes the latest description.
pub fn parse_tag_definitions(content: &str) -> PipelineResult<Vec<TagDefinition>> {
    let mut tags: Vec<TagDefinition> = Vec::new();

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (name, description) = match line.split_once(TAG_SEPARATOR) {
            Some((name, description)) => (name.trim(), description.trim()),
            None => (line, line),
        };
        if name.is_empty() {
            return Err(PipelineError::TagDefinitions(format!(
                "line {}: empty tag name",
                number + 1
            )));
        }
        let description = if description.is_empty() { name } else { description };

        match tags.iter_mut().find(|t| t.name == name) {
            Some(existing) => existing.description = description.to_string(),
            None => tags.push(TagDefinition {
                name: name.to_string(),
                description: description.to_string(),
            }),
        }
    }

    Ok(tags)
}

pub fn load_tag_definitions(path: &Path) -> PipelineResult<Vec<TagDefinition>> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        PipelineError::TagDefinitions(format!("cannot read {}: {err}", path.display()))
    })?;
    parse_tag_definitions(&content)
}

/// One vector per definition, in definition order. Cached vectors are
/// reused while the description hash and model both match.
pub fn resolve_tag_embeddings(
    store: &dyn CacheStore,
    provider: &dyn EmbeddingProvider,
    tags: &[TagDefinition],
) -> PipelineResult<Vec<Vec<f32>>> {
    let model = provider.model();

    let mut vectors: Vec<Option<Vec<f32>>> = vec![None; tags.len()];
    let mut pending: Vec<usize> = Vec::new();

    for (index, tag) in tags.iter().enumerate() {
        let hash = hash_text(&tag.description);
        match store.tag_embedding(&tag.name, model)? {
            Some(record) if record.content_hash == hash && !record.embedding.is_empty() => {
                vectors[index] = Some(record.embedding);
            }
            Some(_) => {
                debug!(tag = %tag.name, "tag description changed, re-embedding");
                pending.push(index);
            }
            None => pending.push(index),
        }
    }

    if !pending.is_empty() {
        info!(count = pending.len(), model = %model, "embedding tag descriptions");
        let texts: Vec<String> = pending
            .iter()
            .map(|&i| tags[i].description.clone())
            .collect();
        let embedded = provider
            .embed(&texts)
            .map_err(|source| PipelineError::Embedding {
                committed: 0,
                source,
            })?;
        debug_assert_eq!(embedded.len(), texts.len());

        for (&index, vector) in pending.iter().zip(embedded) {
            let tag = &tags[index];
            let record = TagEmbeddingRecord {
                tag: tag.name.clone(),
                description: tag.description.clone(),
                content_hash: hash_text(&tag.description),
                model: model.to_string(),
                embedding: vector.clone(),
                updated_at: Utc::now(),
            };
            if let Err(err) = store.upsert_tag_embedding(&record) {
                warn!(tag = %tag.name, error = %err, "failed to persist tag embedding");
            }
            vectors[index] = Some(vector);
        }
    }

    Ok(vectors.into_iter().flatten().collect())
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Nearest tag per document by cosine similarity. Ties and degenerate
/// zero-norm vectors resolve to the earliest tag.
pub fn assign_tags(documents: &[Vec<f32>], tags: &[Vec<f32>]) -> Vec<usize> {
    if tags.is_empty() {
        return Vec::new();
    }

    documents
        .iter()
        .map(|doc| {
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for (index, tag) in tags.iter().enumerate() {
                let score = cosine(doc, tag);
                if score > best_score {
                    best = index;
                    best_score = score;
                }
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_core::MemoryStore;
    use filament_embed::MockProvider;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let content =
            "# taxonomy\n\nproject::Active project notes\n\n# more\narchive::Old material\n";
        let tags = parse_tag_definitions(content).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "project");
        assert_eq!(tags[0].description, "Active project notes");
        assert_eq!(tags[1].name, "archive");
    }

    #[test]
    fn test_parse_splits_on_first_separator_only() {
        let tags = parse_tag_definitions("recipe::food::and drink").unwrap();
        assert_eq!(tags[0].name, "recipe");
        assert_eq!(tags[0].description, "food::and drink");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let tags = parse_tag_definitions("one::first\r\ntwo::second\r\n").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].description, "second");
    }

    #[test]
    fn test_parse_bare_name_describes_itself() {
        let tags = parse_tag_definitions("evergreen").unwrap();
        assert_eq!(tags[0].name, "evergreen");
        assert_eq!(tags[0].description, "evergreen");
    }

    #[test]
    fn test_parse_empty_description_falls_back_to_name() {
        let tags = parse_tag_definitions("evergreen::   ").unwrap();
        assert_eq!(tags[0].description, "evergreen");
    }

    #[test]
    fn test_parse_duplicate_keeps_position_takes_latest() {
        let tags = parse_tag_definitions("a::first\nb::second\na::rewritten").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "a");
        assert_eq!(tags[0].description, "rewritten");
        assert_eq!(tags[1].name, "b");
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        let err = parse_tag_definitions("::described nothing").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 1"), "{message}");
    }

    #[test]
    fn test_resolve_embeds_each_description_once() {
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let tags = parse_tag_definitions("a::first description\nb::second description").unwrap();

        let first = resolve_tag_embeddings(&store, &provider, &tags).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(provider.embedded_count(), 2);

        let second = resolve_tag_embeddings(&store, &provider, &tags).unwrap();
        assert_eq!(provider.embedded_count(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_re_embeds_changed_description() {
        let store = MemoryStore::new();
        let provider = MockProvider::new();
        let tags = parse_tag_definitions("a::first\nb::second").unwrap();
        resolve_tag_embeddings(&store, &provider, &tags).unwrap();

        let edited = parse_tag_definitions("a::first\nb::rewritten").unwrap();
        resolve_tag_embeddings(&store, &provider, &edited).unwrap();

        assert_eq!(provider.embedded_count(), 3);
        assert_eq!(
            provider.embedded_texts().last().map(String::as_str),
            Some("rewritten")
        );
    }

    #[test]
    fn test_resolve_keeps_definition_order_with_mixed_cache_state() {
        let store = MemoryStore::new();
        let provider = MockProvider::new();

        let partial = parse_tag_definitions("b::second").unwrap();
        resolve_tag_embeddings(&store, &provider, &partial).unwrap();

        let all = parse_tag_definitions("a::first\nb::second\nc::third").unwrap();
        let vectors = resolve_tag_embeddings(&store, &provider, &all).unwrap();

        let expected_b = provider.embed(&["second".to_string()]).unwrap();
        assert_eq!(vectors[1], expected_b[0]);
        assert_eq!(vectors.len(), 3);
    }

    #[test]
    fn test_assign_picks_nearest_tag() {
        let tags = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let documents = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        assert_eq!(assign_tags(&documents, &tags), vec![0, 1]);
    }

    #[test]
    fn test_assign_tie_prefers_first_tag() {
        let tags = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let documents = vec![vec![1.0, 0.0]];
        assert_eq!(assign_tags(&documents, &tags), vec![0]);
    }

    #[test]
    fn test_assign_zero_vector_defaults_to_first() {
        let tags = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let documents = vec![vec![0.0, 0.0]];
        assert_eq!(assign_tags(&documents, &tags), vec![0]);
    }

    #[test]
    fn test_assign_with_no_tags_is_empty() {
        assert!(assign_tags(&[vec![1.0]], &[]).is_empty());
    }
}
