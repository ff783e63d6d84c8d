//! Embedding providers for Filament.
//!
//! Everything that talks to an embedding model lives here, behind the
//! [`EmbeddingProvider`] trait: a batch of texts in, one vector per
//! text out. Two real backends are supported (Ollama and any
//! OpenAI-compatible API) plus a deterministic mock for tests and
//! offline runs.
//!
//! ```rust
//! use filament_embed::{create_provider, EmbedConfig};
//!
//! let provider = create_provider(&EmbedConfig::mock()).unwrap();
//! let vectors = provider.embed(&["some markdown".to_string()]).unwrap();
//! assert_eq!(vectors.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

use std::sync::Arc;

pub use config::{EmbedConfig, ProviderType};
pub use error::{EmbeddingError, EmbeddingResult};
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::EmbeddingProvider;

/// Builds the provider named by the config.
pub fn create_provider(config: &EmbedConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        ProviderType::Ollama => Ok(Arc::new(OllamaProvider::new(config)?)),
        ProviderType::OpenAI => Ok(Arc::new(OpenAiProvider::new(config)?)),
        ProviderType::Mock => Ok(Arc::new(MockProvider::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_provider() {
        let mock = create_provider(&EmbedConfig::mock()).unwrap();
        assert_eq!(mock.model(), "mock-embedder");

        let ollama = create_provider(&EmbedConfig::ollama()).unwrap();
        assert_eq!(ollama.model(), "nomic-embed-text");

        let openai = create_provider(&EmbedConfig::openai("sk-test")).unwrap();
        assert_eq!(openai.model(), "text-embedding-3-small");
    }
}
