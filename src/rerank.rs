//! Secondary relevance scoring over retrieval candidates.
//!
//! A reranker re-scores candidates against the literal query and returns a
//! trimmed list with `relevance_score` in `[0, 1]`. Two implementations sit
//! behind the [`Reranker`] trait: [`HttpReranker`] calls a Cohere-style
//! endpoint, and [`LexicalReranker`] is the in-process fallback used when no
//! rerank credential is configured.
//!
//! Both uphold the contract: no candidate is invented that was not in the
//! input, and ties preserve input order (stable sort).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::stores::RetrievalHit;
use crate::types::GroundError;

/// A retrieval hit after secondary scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct RerankedHit {
    pub page: u32,
    pub text: String,
    /// Relevance in `[0, 1]`; the reranker's output order is authoritative.
    pub relevance_score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Returns up to `n` re-scored candidates, best first.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalHit],
        n: usize,
    ) -> Result<Vec<RerankedHit>, GroundError>;
}

/// Positional fallback scoring: input order kept, scores 1.0, 0.9, 0.8, …
/// floored at zero. Used when a remote reranker is unavailable mid-request.
fn positional(candidates: &[RetrievalHit], n: usize) -> Vec<RerankedHit> {
    candidates
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, hit)| RerankedHit {
            page: hit.page,
            text: hit.text.clone(),
            relevance_score: (1.0 - i as f32 * 0.1).max(0.0),
        })
        .collect()
}

/// Lexical-overlap reranker.
///
/// Scores a candidate as the fraction of unique query tokens (lowercased,
/// alphanumeric runs) that appear among the candidate's tokens, giving a
/// score in `[0, 1]`. Sorting is stable, so candidates with equal overlap
/// keep their retrieval order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

impl LexicalReranker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn tokens(text: &str) -> std::collections::HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalHit],
        n: usize,
    ) -> Result<Vec<RerankedHit>, GroundError> {
        let query_tokens = Self::tokens(query);
        if query_tokens.is_empty() {
            return Ok(positional(candidates, n));
        }

        let mut scored: Vec<RerankedHit> = candidates
            .iter()
            .map(|hit| {
                let candidate_tokens = Self::tokens(&hit.text);
                let overlap = query_tokens
                    .iter()
                    .filter(|t| candidate_tokens.contains(*t))
                    .count();
                RerankedHit {
                    page: hit.page,
                    text: hit.text.clone(),
                    relevance_score: overlap as f32 / query_tokens.len() as f32,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(n);
        Ok(scored)
    }
}

/// Reranker backed by a Cohere-style `/v1/rerank` endpoint.
///
/// On any provider failure this degrades to positional scoring over the
/// input rather than failing the request.
pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl HttpReranker {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    async fn call(
        &self,
        query: &str,
        candidates: &[RetrievalHit],
        n: usize,
    ) -> Result<Vec<RerankedHit>, GroundError> {
        let documents: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&json!({
                "model": self.model,
                "query": query,
                "documents": documents,
                "top_n": n.min(candidates.len()),
                "return_documents": false,
            }))
            .send()
            .await
            .map_err(|err| GroundError::Rerank(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroundError::Rerank(format!(
                "rerank endpoint returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct RerankResponse {
            #[serde(default)]
            results: Vec<RerankResult>,
        }

        #[derive(Deserialize)]
        struct RerankResult {
            index: usize,
            relevance_score: f32,
        }

        let body: RerankResponse = response
            .json()
            .await
            .map_err(|err| GroundError::Rerank(err.to_string()))?;

        // Indices outside the candidate list are dropped: the reranker may
        // never invent candidates.
        Ok(body
            .results
            .into_iter()
            .filter_map(|r| {
                candidates.get(r.index).map(|hit| RerankedHit {
                    page: hit.page,
                    text: hit.text.clone(),
                    relevance_score: r.relevance_score.clamp(0.0, 1.0),
                })
            })
            .take(n)
            .collect())
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalHit],
        n: usize,
    ) -> Result<Vec<RerankedHit>, GroundError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        match self.call(query, candidates, n).await {
            Ok(hits) if !hits.is_empty() => Ok(hits),
            Ok(_) => Ok(positional(candidates, n)),
            Err(err) => {
                warn!(%err, "rerank provider failed, using positional scores");
                Ok(positional(candidates, n))
            }
        }
    }
}
