//! ```text
//! Document URL ──► ingestion::fetch_document ──► page-text strategies ──► [Page]
//!
//! [Page] ─┬─► chunker::chunk_pages ──► [Chunk] ──► embeddings ──► VectorBackend
//!         ├─► extract (vision → text) ──► entities / tables / summary
//!         └─► extract::facts ──► deterministic answers (no model call)
//!
//! Query ──► Retriever::ensure_indexed + top_k ──► Reranker ──► citations
//!
//! GroundingPipeline joins retrieval hits, extraction output, and
//! deterministic facts into page-anchored Citations for the caller.
//! ```
//!
pub mod chunker;
pub mod citations;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod ingestion;
pub mod pipeline;
pub mod rerank;
pub mod retriever;
pub mod stores;
pub mod types;

pub use chunker::{chunk_pages, Chunk};
pub use citations::Citation;
pub use config::{ConfigBuilder, GroundingConfig};
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use extract::facts::{
    answer_deterministic, extract_facts, DeterministicAnswer, DocumentFacts, Fact,
};
pub use extract::{
    extract_document, DocumentExtraction, DocumentExtractor, Entity, EntityKind, Table,
};
pub use ingestion::{pages_from_text, DocumentFetcher};
pub use pipeline::{
    GroundedContext, GroundingOutcome, GroundingPipeline, SourceDocument, NO_CONTENT_SIGNAL,
};
pub use rerank::{HttpReranker, LexicalReranker, RerankedHit, Reranker};
pub use retriever::Retriever;
pub use stores::{DocumentIndex, MemoryVectorStore, RestVectorIndex, RetrievalHit, VectorBackend};
pub use types::{Embedding, GroundError, Page};
