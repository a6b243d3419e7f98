//! Embedding backends

use async_trait::async_trait;
use pythia_core::{PythiaError, Result};
use std::time::Duration;

const EMBED_TIMEOUT_SECS: u64 = 5;

/// Turns text into a vector for similarity recall.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Calls the Ollama `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(model: impl Into<String>, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "prompt": text });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PythiaError::Store(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PythiaError::Store(format!(
                "Embedding endpoint returned {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PythiaError::Store(format!("Invalid embedding response: {}", e)))?;

        let embedding: Vec<f32> = json["embedding"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(PythiaError::Store("Empty embedding returned".to_string()));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_normalized() {
        let embedder = OllamaEmbedder::new("nomic-embed-text", "http://localhost:11434/");
        assert_eq!(embedder.url(), "http://localhost:11434/api/embeddings");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_store_error() {
        let embedder = OllamaEmbedder::new("nomic-embed-text", "http://127.0.0.1:1");
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, PythiaError::Store(_)));
    }
}
