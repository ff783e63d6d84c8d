//! Provider selection and connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, EmbeddingResult};

/// Which embedding backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local Ollama server.
    Ollama,
    /// OpenAI or any API-compatible endpoint.
    OpenAI,
    /// Deterministic offline vectors, no network.
    Mock,
}

impl ProviderType {
    /// Parses a provider name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAI),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Mock => "",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "nomic-embed-text",
            Self::OpenAI => "text-embedding-3-small",
            Self::Mock => "mock-embedder",
        }
    }

    pub fn default_dimensions(&self) -> usize {
        match self {
            Self::Ollama => 768,
            Self::OpenAI => 1536,
            Self::Mock => 768,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for constructing an embedding provider.
///
/// Unset fields fall back to the provider's defaults, so a bare
/// `EmbedConfig::ollama()` is enough for a stock local setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    pub provider: ProviderType,

    /// Base URL of the provider API. Defaults per provider.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier. Defaults per provider.
    #[serde(default)]
    pub model: Option<String>,

    /// API key for providers that need one. Falls back to the
    /// `OPENAI_API_KEY` environment variable for OpenAI.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::ollama()
    }
}

impl EmbedConfig {
    pub fn ollama() -> Self {
        Self {
            provider: ProviderType::Ollama,
            endpoint: None,
            model: None,
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: ProviderType::OpenAI,
            endpoint: None,
            model: None,
            api_key: Some(api_key.into()),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn mock() -> Self {
        Self {
            provider: ProviderType::Mock,
            endpoint: None,
            model: None,
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Endpoint with the provider default applied and any trailing
    /// slash stripped, so URL joins stay predictable.
    pub fn endpoint(&self) -> String {
        let raw = self
            .endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint());
        raw.trim_end_matches('/').to_string()
    }

    /// Model identifier with the provider default applied.
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Resolves the API key from the config or the environment.
    pub fn resolve_api_key(&self) -> EmbeddingResult<Option<String>> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }
        if !self.provider.requires_api_key() {
            return Ok(None);
        }
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Some(key)),
            _ => Err(EmbeddingError::Config(format!(
                "provider '{}' requires an API key; set api_key or OPENAI_API_KEY",
                self.provider
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parse() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("OpenAI"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("MOCK"), Some(ProviderType::Mock));
        assert_eq!(ProviderType::parse("cohere"), None);
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(
            ProviderType::Ollama.default_endpoint(),
            "http://localhost:11434"
        );
        assert_eq!(ProviderType::Ollama.default_model(), "nomic-embed-text");
        assert_eq!(ProviderType::Ollama.default_dimensions(), 768);
        assert!(!ProviderType::Ollama.requires_api_key());

        assert_eq!(
            ProviderType::OpenAI.default_endpoint(),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            ProviderType::OpenAI.default_model(),
            "text-embedding-3-small"
        );
        assert_eq!(ProviderType::OpenAI.default_dimensions(), 1536);
        assert!(ProviderType::OpenAI.requires_api_key());
    }

    #[test]
    fn test_config_falls_back_to_provider_defaults() {
        let config = EmbedConfig::ollama();
        assert_eq!(config.endpoint(), "http://localhost:11434");
        assert_eq!(config.model(), "nomic-embed-text");
    }

    #[test]
    fn test_config_overrides_win() {
        let config = EmbedConfig {
            endpoint: Some("http://10.0.0.5:11434/".to_string()),
            model: Some("mxbai-embed-large".to_string()),
            ..EmbedConfig::ollama()
        };
        assert_eq!(config.endpoint(), "http://10.0.0.5:11434");
        assert_eq!(config.model(), "mxbai-embed-large");
    }

    #[test]
    fn test_api_key_not_required_for_ollama() {
        let config = EmbedConfig::ollama();
        assert!(config.resolve_api_key().unwrap().is_none());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = EmbedConfig::openai("sk-test");
        assert_eq!(config.resolve_api_key().unwrap().as_deref(), Some("sk-test"));
    }
}
