//! Deterministic offline provider for tests and dry runs.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::EmbeddingResult;
use crate::provider::{validate_batch, EmbeddingProvider};

/// Produces stable pseudo-embeddings derived from a content hash.
///
/// The same text always maps to the same vector, different texts map to
/// different vectors, and no network is involved. Every embedded text
/// is recorded so tests can assert on exactly what was sent.
pub struct MockProvider {
    model: String,
    dimensions: usize,
    embedded: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_dimensions(768)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            model: "mock-embedder".to_string(),
            dimensions,
            embedded: Mutex::new(Vec::new()),
        }
    }

    /// Number of texts embedded so far, across all calls.
    pub fn embedded_count(&self) -> usize {
        self.embedded.lock().len()
    }

    /// Copy of every text embedded so far, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                let mixed = byte.wrapping_add((i / digest.len()) as u8);
                f32::from(mixed) / 127.5 - 1.0
            })
            .collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for MockProvider {
    fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.embedded.lock().extend(texts.iter().cloned());
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        validate_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_vector() {
        let provider = MockProvider::new();
        let a = provider.embed(&["hello world".to_string()]).unwrap();
        let b = provider.embed(&["hello world".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_texts_differ() {
        let provider = MockProvider::new();
        let vectors = provider
            .embed(&["alpha".to_string(), "beta".to_string()])
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[test]
    fn test_vector_width_matches_configuration() {
        let provider = MockProvider::with_dimensions(16);
        let vectors = provider.embed(&["text".to_string()]).unwrap();
        assert_eq!(vectors[0].len(), 16);
        assert_eq!(provider.dimensions(), 16);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let provider = MockProvider::new();
        let vectors = provider.embed(&["range check".to_string()]).unwrap();
        assert!(vectors[0].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_records_embedded_texts_in_order() {
        let provider = MockProvider::new();
        provider.embed(&["one".to_string()]).unwrap();
        provider
            .embed(&["two".to_string(), "three".to_string()])
            .unwrap();
        assert_eq!(provider.embedded_count(), 3);
        assert_eq!(provider.embedded_texts(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_empty_batch() {
        let provider = MockProvider::new();
        assert!(provider.embed(&[]).unwrap().is_empty());
        assert_eq!(provider.embedded_count(), 0);
    }
}
