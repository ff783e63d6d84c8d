//! Content hashing and excerpt extraction.
//!
//! The digest computed here is the authoritative staleness signal for the
//! cache: a record may only be reused while the stored digest equals the
//! digest of the text the embedding was computed from. Hashing therefore
//! always happens on the same read that produces the text handed to the
//! embedding function.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::HashError;

static SUMMARY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--\s*AUTO-GENERATED SUMMARY START\s*-->\s*(.*?)\s*<!--\s*AUTO-GENERATED SUMMARY END\s*-->",
    )
    .expect("summary block pattern is valid")
});

/// Which portion of a document feeds the embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// The full document body.
    Body,
    /// The auto-generated summary block, falling back to the full body when
    /// no block is present.
    Excerpt,
}

impl ContentMode {
    /// Model-identity suffix so body and excerpt vectors never share a
    /// cache record.
    pub fn identity_suffix(&self) -> &'static str {
        match self {
            ContentMode::Body => "",
            ContentMode::Excerpt => "#summary",
        }
    }
}

/// Text selected by a [`ContentMode`] together with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub content_hash: String,
}

/// SHA-256 hex digest of `text`'s UTF-8 bytes.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the auto-generated summary block out of markdown content.
///
/// Returns `None` when there is no block or the block is empty.
pub fn extract_summary(content: &str) -> Option<&str> {
    let captures = SUMMARY_BLOCK.captures(content)?;
    let summary = captures.get(1)?.as_str().trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// Read a document and hash the selected portion in one pass.
///
/// The returned digest always matches the returned text, which is what gets
/// persisted alongside the embedding.
pub fn read_document(path: &Path, mode: ContentMode) -> Result<DocumentText, HashError> {
    let body = std::fs::read_to_string(path).map_err(|source| HashError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match mode {
        ContentMode::Body => body,
        ContentMode::Excerpt => match extract_summary(&body) {
            Some(summary) => summary.to_string(),
            None => body,
        },
    };

    let content_hash = hash_text(&text);
    Ok(DocumentText { text, content_hash })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_text_known_vectors() {
        assert_eq!(
            hash_text(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_text("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_text_deterministic() {
        let a = hash_text("some markdown content");
        let b = hash_text("some markdown content");
        assert_eq!(a, b);
        assert_ne!(a, hash_text("some markdown content "));
    }

    #[test]
    fn test_extract_summary() {
        let content = "# Title\n\n<!-- AUTO-GENERATED SUMMARY START -->\nA short summary.\n<!-- AUTO-GENERATED SUMMARY END -->\n\nBody text.";
        assert_eq!(extract_summary(content), Some("A short summary."));
    }

    #[test]
    fn test_extract_summary_case_insensitive() {
        let content =
            "<!-- auto-generated summary start -->\ncontent\n<!-- auto-generated summary end -->";
        assert_eq!(extract_summary(content), Some("content"));
    }

    #[test]
    fn test_extract_summary_missing_or_empty() {
        assert_eq!(extract_summary("# Just a note"), None);
        let empty =
            "<!-- AUTO-GENERATED SUMMARY START -->\n\n<!-- AUTO-GENERATED SUMMARY END -->";
        assert_eq!(extract_summary(empty), None);
    }

    #[test]
    fn test_read_document_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "hello world").unwrap();

        let doc = read_document(&path, ContentMode::Body).unwrap();
        assert_eq!(doc.text, "hello world");
        assert_eq!(doc.content_hash, hash_text("hello world"));
    }

    #[test]
    fn test_read_document_excerpt_falls_back_to_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "no summary here").unwrap();

        let doc = read_document(&path, ContentMode::Excerpt).unwrap();
        assert_eq!(doc.text, "no summary here");
    }

    #[test]
    fn test_read_document_excerpt_uses_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        let content = "intro\n<!-- AUTO-GENERATED SUMMARY START -->\nthe gist\n<!-- AUTO-GENERATED SUMMARY END -->\nrest";
        std::fs::write(&path, content).unwrap();

        let doc = read_document(&path, ContentMode::Excerpt).unwrap();
        assert_eq!(doc.text, "the gist");
        assert_eq!(doc.content_hash, hash_text("the gist"));
    }

    #[test]
    fn test_read_document_missing_file() {
        let err = read_document(Path::new("/nonexistent/nowhere.md"), ContentMode::Body)
            .unwrap_err();
        assert!(matches!(err, HashError::Read { .. }));
    }

    #[test]
    fn test_identity_suffix() {
        assert_eq!(ContentMode::Body.identity_suffix(), "");
        assert_eq!(ContentMode::Excerpt.identity_suffix(), "#summary");
    }
}
