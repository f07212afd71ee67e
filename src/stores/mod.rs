//! Vector storage backends for document indexes.
//!
//! [`VectorBackend`] abstracts over where (chunk, embedding) pairs live so
//! the retriever can work against either implementation behind one contract:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │  VectorBackend   │
//!                  │ (upsert / query) │
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!      ┌───────────────┐        ┌────────────────┐
//!      │ MemoryVector  │        │ RestVectorIndex│
//!      │ Store (cosine)│        │ (remote, REST) │
//!      └───────────────┘        └────────────────┘
//! ```
//!
//! The backend is selected once at retriever construction, driven by
//! configuration presence, never by branching at call sites.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chunker::Chunk;
use crate::types::{Embedding, GroundError};

pub use memory::MemoryVectorStore;
pub use remote::RestVectorIndex;

/// A candidate passage returned from a nearest-neighbor query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub page: u32,
    pub text: String,
    /// Raw cosine similarity or the backend's native score.
    pub score: f32,
}

/// The (chunks, embeddings) pair for one document.
///
/// The two lists are parallel: `embeddings[i]` belongs to `chunks[i]`. The
/// index is written exactly once per document identifier, then only read.
#[derive(Clone, Debug, Default)]
pub struct DocumentIndex {
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Embedding>,
}

impl DocumentIndex {
    pub fn new(chunks: Vec<Chunk>, embeddings: Vec<Embedding>) -> Self {
        debug_assert_eq!(chunks.len(), embeddings.len());
        Self { chunks, embeddings }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Storage contract shared by the in-process and remote backends.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Stores the complete index for `doc_id`. Implementations must be
    /// all-or-nothing from the caller's perspective: a document is either
    /// fully indexed or treated as not yet indexed.
    async fn upsert(&self, doc_id: &str, index: Arc<DocumentIndex>) -> Result<(), GroundError>;

    /// Returns up to `top_k` hits for `doc_id` ordered by descending score.
    async fn query(
        &self,
        doc_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, GroundError>;
}
