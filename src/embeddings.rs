//! Pluggable embedding providers.
//!
//! [`EmbeddingProvider`] is the seam between the retriever and whichever
//! service turns text into vectors. [`HttpEmbeddingProvider`] talks to an
//! OpenAI-compatible endpoint; [`MockEmbeddingProvider`] produces
//! deterministic vectors and counts calls, which the idempotent-indexing
//! tests rely on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::types::{Embedding, GroundError};

/// Converts batches of text into embedding vectors.
///
/// Implementations must return exactly one vector per input string, in input
/// order, from a single batched call. They must not retry internally; retry
/// policy belongs to the caller.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, GroundError>;
}

/// Embedding provider backed by an OpenAI-style `/v1/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpEmbeddingProvider {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key,
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, GroundError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GroundError::EmbeddingProvider("missing embedding credential".to_string())
        })?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&json!({ "input": texts, "model": self.model }))
            .send()
            .await
            .map_err(|err| GroundError::EmbeddingProvider(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroundError::EmbeddingProvider(format!(
                "embeddings endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| GroundError::EmbeddingProvider(err.to_string()))?;

        if body.data.len() != texts.len() {
            return Err(GroundError::EmbeddingProvider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic in-process embedding provider for tests.
///
/// Vectors are derived from a text hash so identical inputs always produce
/// identical embeddings. The batch call counter lets tests assert how many
/// provider round-trips a code path triggered.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub const DIMENSIONS: usize = 8;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed_batch` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this provider would return for `text`.
    #[must_use]
    pub fn vector_for(text: &str) -> Embedding {
        // FNV-1a over the bytes, re-mixed per dimension.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }

        (0..Self::DIMENSIONS)
            .map(|dim| {
                let mixed = hash
                    .rotate_left(dim as u32 * 7)
                    .wrapping_mul(0x9e37_79b9_7f4a_7c15);
                ((mixed >> 40) as f32 / 16_777_216.0) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, GroundError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "identical text, identical embedding");
        assert_ne!(first[0], first[1], "different text, different embedding");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_dimensionality_is_constant() {
        let provider = MockEmbeddingProvider::new();
        let vectors = provider
            .embed_batch(&["a".to_string(), "bb".to_string(), "ccc".to_string()])
            .await
            .unwrap();
        assert!(vectors
            .iter()
            .all(|v| v.len() == MockEmbeddingProvider::DIMENSIONS));
    }

    #[tokio::test]
    async fn http_provider_requires_credential() {
        let provider = HttpEmbeddingProvider::new(
            "https://api.openai.com/v1/embeddings",
            "text-embedding-3-small",
            None,
            Duration::from_secs(5),
        );
        let err = provider
            .embed_batch(&["text".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, GroundError::EmbeddingProvider(_)));
    }
}
