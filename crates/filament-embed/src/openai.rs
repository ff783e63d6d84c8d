//! OpenAI-compatible embedding provider.
//!
//! Works against the official API and against anything that speaks the
//! same `/embeddings` contract (Azure deployments, local gateways).

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{validate_batch, EmbeddingProvider};

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiProvider {
    pub fn new(config: &EmbedConfig) -> EmbeddingResult<Self> {
        let api_key = config.resolve_api_key()?.ok_or_else(|| {
            EmbeddingError::Config("OpenAI provider requires an API key".to_string())
        })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint(),
            model: config.model(),
            api_key,
            dimensions: config.provider.default_dimensions(),
        })
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!(count = texts.len(), model = %self.model, "requesting OpenAI embeddings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| EmbeddingError::Http(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(EmbeddingError::InvalidResponse(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| EmbeddingError::InvalidResponse(format!("malformed OpenAI response: {e}")))?;

        // The API does not promise response order, so restore it from
        // the index field before handing vectors back.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

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
