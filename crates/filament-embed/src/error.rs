//! Error types for embedding providers.

use thiserror::Error;

/// Errors surfaced by embedding providers and their configuration.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider configuration is invalid or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a usable HTTP response.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The provider answered, but not with what we asked for.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// Vectors in one batch disagree on dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
