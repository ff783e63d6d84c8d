//! Core building blocks for the Filament semantic linker.
//!
//! This crate holds everything that does not touch SQLite or the network:
//! the persisted record types, content hashing, the two-phase change
//! detector, the cosine similarity engine, and link selection. Higher
//! layers (`filament-sqlite`, `filament-pipeline`, `filament-cli`) depend
//! on the abstractions defined here, most importantly the [`CacheStore`]
//! trait which every storage backend implements.

pub mod changes;
pub mod cluster;
pub mod error;
pub mod hashing;
pub mod linking;
pub mod memory;
pub mod similarity;
pub mod store;
pub mod types;

pub use changes::{detect_changes, modification_time_ns};
pub use cluster::kmeans_labels;
pub use error::{ClusterError, HashError, SimilarityError, StoreError, StoreResult};
pub use hashing::{extract_summary, hash_text, read_document, ContentMode, DocumentText};
pub use linking::{select_links, LinkMap, LinkOptions};
pub use memory::MemoryStore;
pub use similarity::{combine_matrices, cosine_similarity_matrix, embedding_matrix};
pub use store::{CacheStore, RunFilter, RunPrune};
pub use types::{
    ChangeSet, ChangeStats, DocumentRecord, RunRecord, RunStatus, TagEmbeddingRecord,
};
