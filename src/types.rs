//! Shared data types and the error taxonomy for the grounding pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-length numeric vector representing a chunk or query for similarity
/// search. Dimensionality is constant within one document index.
pub type Embedding = Vec<f32>;

/// One page of extracted document text.
///
/// Pages are produced once per document fetch and never mutated; the chunker
/// consumes them in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number within the source document.
    pub number: u32,
    /// Raw extracted text for the page.
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Errors produced by the grounding core.
///
/// None of these is fatal to an overall request: fetch and extraction errors
/// are recovered locally (the affected document contributes no pages), index
/// backend errors trigger the in-process fallback, and embedding errors abort
/// only the retrieval step.
#[derive(Debug, Error)]
pub enum GroundError {
    /// Document unreachable, non-2xx status, or fetch timeout.
    #[error("document fetch failed: {0}")]
    Fetch(String),

    /// Missing embedding credential or provider failure. The provider never
    /// retries internally; retry policy belongs to the caller.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// A parser failed on malformed content.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The remote vector index is unreachable or rejected a call.
    #[error("vector index backend error: {0}")]
    IndexBackend(String),

    /// The rerank provider is unreachable or rejected a call. Always
    /// recovered by positional fallback scoring, never surfaced.
    #[error("rerank provider error: {0}")]
    Rerank(String),

    /// An environment variable or builder input could not be parsed.
    #[error("invalid configuration for {key}: {message}")]
    Config { key: String, message: String },
}
