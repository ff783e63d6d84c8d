//! The provider trait every embedding backend implements.

use crate::error::{EmbeddingError, EmbeddingResult};

/// A backend that turns text into fixed-width vectors.
///
/// Implementations are synchronous and must return exactly one vector
/// per input text, in input order. Callers chunk large workloads into
/// batches themselves.
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts. One vector per text, same order.
    fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Model identifier, used to key cached embeddings.
    fn model(&self) -> &str;

    /// Nominal vector width for the configured model. Actual record
    /// dimensions always come from the returned vectors.
    fn dimensions(&self) -> usize;
}

/// Checks a response batch against the request: right count, and every
/// vector the same width.
pub(crate) fn validate_batch(
    expected_count: usize,
    vectors: &[Vec<f32>],
) -> EmbeddingResult<()> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse(format!(
            "requested {} embeddings, received {}",
            expected_count,
            vectors.len()
        )));
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    for vector in &vectors[1..] {
        if vector.len() != first.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: first.len(),
                found: vector.len(),
            });
        }
    }
    Ok(())
}
