//! Orchestration between the store, the change detector, and the
//! embedding providers.
//!
//! The pipeline owns the incremental story: [`EmbeddingCache::resolve`]
//! turns a document list into vectors while embedding only what changed,
//! tag descriptions resolve through the same cache discipline, and every
//! command invocation is bracketed by a [`RunLogger`].

pub mod cache;
pub mod error;
pub mod runs;
pub mod tags;

pub use cache::{EmbeddingCache, ResolvedEmbeddings, DEFAULT_BATCH_SIZE};
pub use error::{PipelineError, PipelineResult};
pub use runs::RunLogger;
pub use tags::{
    assign_tags, load_tag_definitions, parse_tag_definitions, resolve_tag_embeddings,
    TagDefinition,
};
