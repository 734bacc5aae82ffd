use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use loam_core::{LoamError, Result};

/// Trait for encoding task descriptions into embedding vectors.
///
/// Vectors are normalized by the engine before use, so providers may return
/// raw or normalized output.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a batch of texts. One output vector per input, same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// The dimensionality of the output embeddings.
    fn dimensions(&self) -> usize;

    /// Provider name, for logging.
    fn name(&self) -> &str;
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingRow>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingRow {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings endpoint (`/v1/embeddings`).
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedding {
    /// Defaults to text-embedding-3-small (1536 dims).
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
            dims: 1536,
        }
    }

    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self
    }

    /// Point at a compatible gateway (Azure, local proxies).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(model = %self.model, count = texts.len(), "encoding texts");

        let body = serde_json::json!({
            "model": &self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LoamError::Embedding(format!("embedding request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(LoamError::Embedding(format!(
                "embedding HTTP {status}: {detail}"
            )));
        }

        let parsed: OpenAiEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| LoamError::Embedding(format!("embedding parse error: {e}")))?;

        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Local Ollama embeddings (`/api/embeddings`). One request per text — the
/// endpoint is single-prompt.
pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedding {
    pub fn new(model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "http://127.0.0.1:11434".into(),
            model: model.to_string(),
            dims: 768, // common default, varies by model
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for text in texts {
            let body = serde_json::json!({
                "model": &self.model,
                "prompt": text,
            });

            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| LoamError::Embedding(format!("ollama embedding: {e}")))?;

            if !resp.status().is_success() {
                let detail = resp.text().await.unwrap_or_default();
                return Err(LoamError::Embedding(format!(
                    "ollama embedding error: {detail}"
                )));
            }

            let parsed: OllamaEmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| LoamError::Embedding(e.to_string()))?;

            if parsed.embedding.is_empty() {
                return Err(LoamError::Embedding(format!(
                    "ollama returned an empty embedding for model {}",
                    self.model
                )));
            }
            results.push(parsed.embedding);
        }

        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
