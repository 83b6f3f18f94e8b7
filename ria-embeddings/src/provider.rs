use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::EmbeddingError;

pub type EmbeddingVector = Vec<f32>;

/// Contract: `embed(texts) -> Vector` with fixed dimensionality `D`,
/// deterministic for a given provider+input, preserves input order, and
/// batches internally (spec §4.1).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    async fn health_check(&self) -> Result<bool, EmbeddingError>;
}

/// Deterministic, hash-seeded provider used as the default and in tests —
/// no network calls, fully reproducible for a given input.
pub struct DeterministicEmbeddingProvider {
    dimension: usize,
    model_name: String,
}

impl DeterministicEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: "deterministic".to_string(),
        }
    }

    fn embed_one(&self, text: &str) -> EmbeddingVector {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();
        (0..self.dimension)
            .map(|i| {
                let seed = hash.wrapping_add(i as u64);
                let normalized = (seed % 1000) as f32 / 1000.0;
                normalized * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> Result<bool, EmbeddingError> {
        Ok(true)
    }
}

/// HTTP-backed provider calling an external embedding gateway.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>, dimension: usize, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
            model_name: model_name.into(),
            dimension,
        }
    }

    fn classify_transport_error(err: &reqwest::Error) -> EmbeddingError {
        if err.is_timeout() || err.is_connect() {
            EmbeddingError::Transient(err.to_string())
        } else if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                EmbeddingError::Transient(format!("status {status}"))
            } else {
                EmbeddingError::Permanent(format!("status {status}"))
            }
        } else {
            EmbeddingError::Transient(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let span = tracing::info_span!("embed_batch", batch_size = texts.len(), model = %self.model_name);
        let _enter = span.enter();

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({ "model": self.model_name, "input": text });
            let response = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| Self::classify_transport_error(&e))?;

            if !response.status().is_success() {
                let status = response.status();
                return if status.is_server_error() || status.as_u16() == 429 {
                    Err(EmbeddingError::Transient(format!("gateway status {status}")))
                } else {
                    Err(EmbeddingError::Permanent(format!("gateway status {status}")))
                };
            }

            let parsed: serde_json::Value = response
                .json()
                .await
                .map_err(|e| EmbeddingError::Permanent(format!("malformed response: {e}")))?;
            let raw = parsed["embedding"]
                .as_array()
                .ok_or_else(|| EmbeddingError::Permanent("missing 'embedding' field".to_string()))?;
            let vector: EmbeddingVector = raw.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect();

            if vector.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            embeddings.push(vector);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> Result<bool, EmbeddingError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_provider_is_reproducible() {
        let provider = DeterministicEmbeddingProvider::new(16);
        let texts = vec!["AI governance framework".to_string()];
        let a = provider.generate_embeddings(&texts).await.unwrap();
        let b = provider.generate_embeddings(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
    }

    #[tokio::test]
    async fn deterministic_provider_preserves_order() {
        let provider = DeterministicEmbeddingProvider::new(8);
        let texts = vec!["first".to_string(), "second".to_string()];
        let out = provider.generate_embeddings(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_ne!(out[0], out[1]);
    }
}
