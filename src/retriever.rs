//! Retrieval orchestration: "ensure indexed" + "query top-K".
//!
//! The retriever owns the backend choice (remote index when configured,
//! in-process store otherwise) and a process-wide index cache with
//! single-flight semantics: concurrent callers for the same document share
//! one chunk-and-embed pass instead of duplicating the dominant embedding
//! cost. A document is embedded at most once per process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::chunker::chunk_pages;
use crate::config::GroundingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::stores::{
    DocumentIndex, MemoryVectorStore, RestVectorIndex, RetrievalHit, VectorBackend,
};
use crate::types::{Embedding, GroundError, Page};

type IndexCell = Arc<OnceCell<Arc<DocumentIndex>>>;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    /// Remote backend, when configured. The in-process store below is always
    /// populated as the authoritative local view, so a remote failure can
    /// silently fall back to it.
    remote: Option<Arc<dyn VectorBackend>>,
    local: Arc<MemoryVectorStore>,
    max_chunk_chars: usize,
    inflight: Mutex<HashMap<String, IndexCell>>,
}

impl Retriever {
    /// Builds a retriever from configuration, selecting the backend once:
    /// remote REST index if fully configured, in-process store otherwise.
    pub fn from_config(config: &GroundingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let remote: Option<Arc<dyn VectorBackend>> = match (
            config.vector_index_url.as_ref(),
            config.vector_index_token.as_ref(),
        ) {
            (Some(url), Some(token)) => Some(Arc::new(RestVectorIndex::new(
                url.clone(),
                token.clone(),
                config.http_timeout,
            ))),
            _ => None,
        };
        Self::new(embedder, remote, config.max_chunk_chars)
    }

    /// Builds a retriever with an explicit backend. Used directly by tests
    /// that inject failing or counting backends.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        remote: Option<Arc<dyn VectorBackend>>,
        max_chunk_chars: usize,
    ) -> Self {
        Self {
            embedder,
            remote,
            local: Arc::new(MemoryVectorStore::new()),
            max_chunk_chars,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Chunks, embeds, and stores `pages` under `doc_id`, returning the
    /// resulting index. Idempotent: a second call for the same `doc_id`
    /// returns the cached index without re-embedding, and concurrent callers
    /// share one in-flight pass. On failure the document is left not-yet-
    /// indexed so a later call can retry.
    pub async fn ensure_indexed(
        &self,
        doc_id: &str,
        pages: &[Page],
    ) -> Result<Arc<DocumentIndex>, GroundError> {
        let cell = {
            let mut inflight = self.inflight.lock();
            inflight.entry(doc_id.to_string()).or_default().clone()
        };

        let index = cell
            .get_or_try_init(|| self.build_index(doc_id, pages))
            .await?;
        Ok(index.clone())
    }

    async fn build_index(
        &self,
        doc_id: &str,
        pages: &[Page],
    ) -> Result<Arc<DocumentIndex>, GroundError> {
        let chunks = chunk_pages(pages, self.max_chunk_chars);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings: Vec<Embedding> = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };

        debug!(doc_id, chunks = chunks.len(), "indexed document");
        let index = Arc::new(DocumentIndex::new(chunks, embeddings));

        // Local view is authoritative; the remote upsert is best-effort and
        // must never fail the request.
        self.local.upsert(doc_id, index.clone()).await?;
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.upsert(doc_id, index.clone()).await {
                warn!(doc_id, %err, "remote index upsert failed, keeping local view");
            }
        }

        Ok(index)
    }

    /// Embeds a query string via a single-element batch.
    pub async fn embed_query(&self, query: &str) -> Result<Embedding, GroundError> {
        let mut vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            GroundError::EmbeddingProvider("provider returned no query embedding".to_string())
        })
    }

    /// Returns up to `k` hits for `doc_id`, best first. When the remote
    /// backend is configured but fails, the in-process store answers instead;
    /// the failure is logged, never surfaced.
    pub async fn top_k(
        &self,
        doc_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalHit>, GroundError> {
        if let Some(remote) = &self.remote {
            match remote.query(doc_id, query_embedding, k).await {
                Ok(hits) => return Ok(hits),
                Err(err) => {
                    warn!(doc_id, %err, "remote index query failed, using in-process store");
                }
            }
        }
        self.local.query(doc_id, query_embedding, k).await
    }

    /// Whether an index for `doc_id` has been built in this process.
    pub fn is_indexed(&self, doc_id: &str) -> bool {
        self.local.contains(doc_id)
    }
}
