//! Error types for the pipeline layer.

use filament_core::StoreError;
use filament_embed::EmbeddingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The embedding call failed. `committed` reports how many documents
    /// were already persisted this run, so the caller can distinguish a
    /// partial run from a total failure.
    #[error("Embedding failed after {committed} documents were persisted: {source}")]
    Embedding {
        committed: usize,
        #[source]
        source: EmbeddingError,
    },

    /// The tag-definitions file is missing or malformed.
    #[error("Tag definitions error: {0}")]
    TagDefinitions(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
