//! Ollama embedding provider.
//!
//! Talks to a local (or remote) Ollama server over its `/api/embed`
//! endpoint, which accepts a whole batch of inputs in one request.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{validate_batch, EmbeddingProvider};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(config: &EmbedConfig) -> EmbeddingResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint(),
            model: config.model(),
            dimensions: config.provider.default_dimensions(),
        })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!(count = texts.len(), model = %self.model, "requesting Ollama embeddings");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| EmbeddingError::Http(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(EmbeddingError::InvalidResponse(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| EmbeddingError::InvalidResponse(format!("malformed Ollama response: {e}")))?;

        validate_batch(texts.len(), &parsed.embeddings)?;
        Ok(parsed.embeddings)
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
    fn test_request_body_shape() {
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: &texts,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_response_parsing_ignores_extra_fields() {
        let body = r#"{
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]],
            "total_duration": 12345
        }"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert_eq!(parsed.embeddings[0], vec![0.1, 0.2]);
    }

    #[test]
    fn test_provider_reports_configured_model() {
        let provider = OllamaProvider::new(&EmbedConfig::ollama()).unwrap();
        assert_eq!(provider.model(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }
}
