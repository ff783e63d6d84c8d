//! Managed regions inside vault documents.
//!
//! Two kinds of edits: the auto-generated links block delimited by HTML
//! comment markers, and the tags key in YAML front matter. Everything else
//! in a document is left untouched, and re-applying unchanged results
//! leaves the file byte-identical.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use serde_yaml::{Mapping, Value};

pub const LINKS_START: &str = "<!-- AUTO-GENERATED LINKS START -->";
pub const LINKS_END: &str = "<!-- AUTO-GENERATED LINKS END -->";

/// Front matter key managed by the tag command.
pub const TAGS_KEY: &str = "tags";

// Marker lines may be indented or carry trailing blanks; the newline after
// the end marker belongs to the block so removal leaves no hole.
static LINKS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ms)^[ \t]*<!-- AUTO-GENERATED LINKS START -->[ \t]*$.*?^[ \t]*<!-- AUTO-GENERATED LINKS END -->[ \t]*$\n?",
    )
    .expect("links block pattern is valid")
});

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n(.*))?\z")
        .expect("front matter pattern is valid")
});

/// Render the links block for a sorted set of target stems.
pub fn render_links_block(stems: &BTreeSet<String>) -> String {
    let mut block = String::with_capacity(64 + stems.len() * 16);
    block.push_str(LINKS_START);
    block.push_str("\n## Related Notes\n");
    for stem in stems {
        block.push_str("[[");
        block.push_str(stem);
        block.push_str("]]\n");
    }
    block.push_str(LINKS_END);
    block
}

pub fn has_links_block(content: &str) -> bool {
    LINKS_BLOCK.is_match(content)
}

/// Replace an existing links block in place, or append one to the end.
pub fn upsert_links_block(content: &str, block: &str) -> String {
    if LINKS_BLOCK.is_match(content) {
        let replacement = format!("{block}\n");
        LINKS_BLOCK
            .replace_all(content, NoExpand(&replacement))
            .into_owned()
    } else {
        format!("{}\n\n{block}\n", content.trim_end())
    }
}

/// Remove the links block. `None` when there is nothing to remove.
pub fn remove_links_block(content: &str) -> Option<String> {
    if !LINKS_BLOCK.is_match(content) {
        return None;
    }
    Some(LINKS_BLOCK.replace_all(content, "").into_owned())
}

fn parse_front_matter(yaml: &str) -> Result<Mapping> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml::from_str(yaml).context("invalid YAML front matter")
}

fn render_front_matter(mapping: &Mapping, rest: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(mapping).context("front matter serialization")?;
    Ok(format!("---\n{yaml}---\n{rest}"))
}

/// Insert `tag` at the head of the front matter tags list, creating the
/// block or the key when absent. `None` when the tag is already present.
pub fn apply_front_matter_tag(content: &str, tag: &str) -> Result<Option<String>> {
    let (mut mapping, rest) = match FRONT_MATTER.captures(content) {
        Some(caps) => {
            let yaml = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            (parse_front_matter(yaml)?, rest)
        }
        None => (Mapping::new(), content),
    };

    let already_tagged = match mapping.get(TAGS_KEY) {
        Some(Value::Sequence(tags)) => tags.iter().any(|v| v.as_str() == Some(tag)),
        Some(Value::String(existing)) => existing == tag,
        _ => false,
    };
    if already_tagged {
        return Ok(None);
    }

    let tags = match mapping.get(TAGS_KEY).cloned() {
        Some(Value::Sequence(mut existing)) => {
            existing.insert(0, Value::from(tag));
            existing
        }
        // A scalar tags value becomes a list keeping the old entry.
        Some(Value::String(existing)) => vec![Value::from(tag), Value::from(existing)],
        _ => vec![Value::from(tag)],
    };
    mapping.insert(Value::from(TAGS_KEY), Value::Sequence(tags));

    render_front_matter(&mapping, rest).map(Some)
}

/// Strip the tags key from the front matter. `None` when there is nothing
/// to strip; removing the last key drops the block entirely.
pub fn remove_front_matter_tags(content: &str) -> Result<Option<String>> {
    let Some(caps) = FRONT_MATTER.captures(content) else {
        return Ok(None);
    };
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let mut mapping = parse_front_matter(yaml)?;
    if mapping.remove(TAGS_KEY).is_none() {
        return Ok(None);
    }
    if mapping.is_empty() {
        return Ok(Some(rest.to_string()));
    }
    render_front_matter(&mapping, rest).map(Some)
}
