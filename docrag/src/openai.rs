//! Pretrained embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
//!
//! Works against the hosted OpenAI API and against local servers exposing
//! the same route (llama.cpp, LM Studio, Ollama), which is how a small
//! sentence model can be served next to the index.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "openai";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Largest number of inputs sent in one request.
const MAX_BATCH: usize = 256;

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `base_url` – defaults to `https://api.openai.com/v1`.
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – requested output size (Matryoshka truncation on models
///   that support it). Set this to the index's embedding size.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...", 300)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the hosted API with the given key.
    pub fn new(api_key: impl Into<String>, dimensions: usize) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: Some(api_key),
            model: DEFAULT_MODEL.into(),
            dimensions,
        })
    }

    /// Create a provider for an unauthenticated local server.
    pub fn local(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            dimensions,
        }
    }

    /// Create a provider from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL`
    /// and `OPENAI_EMBEDDING_MODEL` when set.
    pub fn from_env(dimensions: usize) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "OPENAI_API_KEY environment variable not set".into(),
        })?;
        let mut provider = Self::new(api_key, dimensions)?;
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            provider = provider.with_base_url(url);
        }
        if let Ok(model) = std::env::var("OPENAI_EMBEDDING_MODEL") {
            provider = provider.with_model(model);
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: Some(self.dimensions),
        };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(
                provider = PROVIDER,
                batch_size = batch.len(),
                model = %self.model,
                "embedding batch"
            );
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("", 300).is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let p = OpenAIEmbeddingProvider::local("http://localhost:8080/v1/", "all-minilm", 384);
        assert_eq!(p.endpoint(), "http://localhost:8080/v1/embeddings");
        assert_eq!(p.dimensions(), 384);
    }

    #[test]
    fn response_is_reordered_by_index() {
        let body = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }
}
