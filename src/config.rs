//! Configuration for the grounding pipeline.
//!
//! [`GroundingConfig`] carries provider endpoints, credentials, and tuning
//! knobs. [`ConfigBuilder`] resolves values in order (later wins):
//!
//! 1. Compiled defaults
//! 2. Environment variables (`CITESMITH_*`), when [`ConfigBuilder::with_env`]
//!    is enabled
//! 3. Explicit builder overrides
//!
//! The remote vector index is selected purely by presence of configuration:
//! when `vector_index_url`/`vector_index_token` are absent the retriever runs
//! on the in-process store.

use std::time::Duration;

use crate::types::GroundError;

const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_RERANK_URL: &str = "https://api.cohere.ai/v1/rerank";
const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";
const DEFAULT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Resolved pipeline configuration.
#[derive(Clone, Debug)]
pub struct GroundingConfig {
    /// Credential for the embedding provider (and the optional vision pass).
    pub embedding_api_key: Option<String>,
    pub embedding_url: String,
    pub embedding_model: String,

    /// Remote vector index endpoint; `None` selects the in-process store.
    pub vector_index_url: Option<String>,
    pub vector_index_token: Option<String>,

    /// Credential for the rerank provider; `None` selects the lexical reranker.
    pub rerank_api_key: Option<String>,
    pub rerank_url: String,
    pub rerank_model: String,

    /// Vision-capable model for the high-accuracy extraction pass; `None`
    /// disables the pass entirely.
    pub vision_model: Option<String>,
    pub completions_url: String,

    /// Maximum characters per chunk.
    pub max_chunk_chars: usize,
    /// Retrieval candidates per document in single-document mode.
    pub top_k: usize,
    /// Retrieval candidates per document when fanning out across documents.
    pub top_k_multi: usize,
    /// Reranked results kept in single-document mode.
    pub rerank_top_n: usize,
    /// Reranked results kept across a multi-document join.
    pub rerank_top_n_multi: usize,

    /// Bound applied to every external network call.
    pub http_timeout: Duration,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            embedding_api_key: None,
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            vector_index_url: None,
            vector_index_token: None,
            rerank_api_key: None,
            rerank_url: DEFAULT_RERANK_URL.to_string(),
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            vision_model: None,
            completions_url: DEFAULT_COMPLETIONS_URL.to_string(),
            max_chunk_chars: 1200,
            top_k: 15,
            top_k_multi: 8,
            rerank_top_n: 6,
            rerank_top_n_multi: 12,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl GroundingConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether a remote vector index is fully configured.
    #[must_use]
    pub fn has_remote_index(&self) -> bool {
        self.vector_index_url.is_some() && self.vector_index_token.is_some()
    }
}

/// Builder for [`GroundingConfig`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base: GroundingConfig,
    use_env: bool,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable loading overrides from `CITESMITH_*` environment variables.
    ///
    /// Recognized keys: `EMBEDDING_API_KEY`, `EMBEDDING_URL`,
    /// `EMBEDDING_MODEL`, `VECTOR_INDEX_URL`, `VECTOR_INDEX_TOKEN`,
    /// `RERANK_API_KEY`, `VISION_MODEL`, `MAX_CHUNK_CHARS`, `TOP_K`,
    /// `TIMEOUT_SECS`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    #[must_use]
    pub fn embedding_api_key(mut self, key: impl Into<String>) -> Self {
        self.base.embedding_api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn embedding_url(mut self, url: impl Into<String>) -> Self {
        self.base.embedding_url = url.into();
        self
    }

    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.base.embedding_model = model.into();
        self
    }

    #[must_use]
    pub fn vector_index(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.base.vector_index_url = Some(url.into());
        self.base.vector_index_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn rerank_api_key(mut self, key: impl Into<String>) -> Self {
        self.base.rerank_api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn rerank_url(mut self, url: impl Into<String>) -> Self {
        self.base.rerank_url = url.into();
        self
    }

    #[must_use]
    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.base.vision_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn completions_url(mut self, url: impl Into<String>) -> Self {
        self.base.completions_url = url.into();
        self
    }

    #[must_use]
    pub fn max_chunk_chars(mut self, max: usize) -> Self {
        self.base.max_chunk_chars = max;
        self
    }

    #[must_use]
    pub fn top_k(mut self, k: usize) -> Self {
        self.base.top_k = k;
        self
    }

    #[must_use]
    pub fn rerank_top_n(mut self, n: usize) -> Self {
        self.base.rerank_top_n = n;
        self
    }

    #[must_use]
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.base.http_timeout = timeout;
        self
    }

    /// Build the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GroundError::Config`] when an environment variable cannot be
    /// parsed into its expected type.
    pub fn build(mut self) -> Result<GroundingConfig, GroundError> {
        if self.use_env {
            dotenvy::dotenv().ok();

            if let Ok(key) = std::env::var("CITESMITH_EMBEDDING_API_KEY") {
                self.base.embedding_api_key = Some(key);
            }
            if let Ok(url) = std::env::var("CITESMITH_EMBEDDING_URL") {
                self.base.embedding_url = url;
            }
            if let Ok(model) = std::env::var("CITESMITH_EMBEDDING_MODEL") {
                self.base.embedding_model = model;
            }
            if let Ok(url) = std::env::var("CITESMITH_VECTOR_INDEX_URL") {
                self.base.vector_index_url = Some(url);
            }
            if let Ok(token) = std::env::var("CITESMITH_VECTOR_INDEX_TOKEN") {
                self.base.vector_index_token = Some(token);
            }
            if let Ok(key) = std::env::var("CITESMITH_RERANK_API_KEY") {
                self.base.rerank_api_key = Some(key);
            }
            if let Ok(model) = std::env::var("CITESMITH_VISION_MODEL") {
                self.base.vision_model = Some(model);
            }
            if let Ok(raw) = std::env::var("CITESMITH_MAX_CHUNK_CHARS") {
                self.base.max_chunk_chars = parse_env("CITESMITH_MAX_CHUNK_CHARS", &raw)?;
            }
            if let Ok(raw) = std::env::var("CITESMITH_TOP_K") {
                self.base.top_k = parse_env("CITESMITH_TOP_K", &raw)?;
            }
            if let Ok(raw) = std::env::var("CITESMITH_TIMEOUT_SECS") {
                let secs: u64 = parse_env("CITESMITH_TIMEOUT_SECS", &raw)?;
                self.base.http_timeout = Duration::from_secs(secs);
            }
        }

        if self.base.max_chunk_chars == 0 {
            return Err(GroundError::Config {
                key: "max_chunk_chars".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(self.base)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, GroundError> {
    raw.parse().map_err(|_| GroundError::Config {
        key: key.to_string(),
        message: format!("could not parse '{raw}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_in_process_backend() {
        let config = GroundingConfig::default();
        assert!(!config.has_remote_index());
        assert_eq!(config.max_chunk_chars, 1200);
        assert_eq!(config.top_k, 15);
    }

    #[test]
    fn builder_overrides() {
        let config = GroundingConfig::builder()
            .embedding_api_key("sk-test")
            .vector_index("https://index.example", "token")
            .max_chunk_chars(800)
            .build()
            .unwrap();

        assert!(config.has_remote_index());
        assert_eq!(config.embedding_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.max_chunk_chars, 800);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = GroundingConfig::builder().max_chunk_chars(0).build();
        assert!(matches!(err, Err(GroundError::Config { .. })));
    }
}
