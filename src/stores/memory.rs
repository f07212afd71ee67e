//! In-process vector store: the always-available fallback backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{DocumentIndex, RetrievalHit, VectorBackend};
use crate::types::GroundError;

/// Process-lifetime store of document indexes keyed by document identifier.
///
/// Writes are append-only per key: once a document is stored its index is
/// never replaced, which preserves the embed-at-most-once cost invariant.
#[derive(Default)]
pub struct MemoryVectorStore {
    docs: RwLock<HashMap<String, Arc<DocumentIndex>>>,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored index for `doc_id`, if any.
    pub fn get(&self, doc_id: &str) -> Option<Arc<DocumentIndex>> {
        self.docs.read().get(doc_id).cloned()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.read().contains_key(doc_id)
    }
}

#[async_trait]
impl VectorBackend for MemoryVectorStore {
    async fn upsert(&self, doc_id: &str, index: Arc<DocumentIndex>) -> Result<(), GroundError> {
        let mut docs = self.docs.write();
        // First writer wins; the key is never overwritten.
        docs.entry(doc_id.to_string()).or_insert(index);
        Ok(())
    }

    async fn query(
        &self,
        doc_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, GroundError> {
        let Some(index) = self.get(doc_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, usize)> = index
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| (cosine_similarity(query_embedding, embedding), i))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, i)| RetrievalHit {
                page: index.chunks[i].page,
                text: index.chunks[i].text.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity `dot(a,b) / (‖a‖·‖b‖)`.
///
/// Both norms are floored to 1 so zero-vectors score 0 instead of dividing
/// by zero. Mismatched lengths compare over the shorter prefix.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    dot / (norm_a.sqrt().max(1.0) * norm_b.sqrt().max(1.0))
}
