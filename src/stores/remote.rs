//! Remote vector index backend over a REST API.
//!
//! Speaks an Upstash-style protocol: `POST {base}/upsert` with id + vector +
//! metadata, `POST {base}/query` with a metadata filter scoping results to
//! one document. Native scores and metadata are mapped back to
//! [`RetrievalHit`]. Any transport or protocol failure surfaces as
//! [`GroundError::IndexBackend`] so the retriever can fall back to the
//! in-process store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{DocumentIndex, RetrievalHit, VectorBackend};
use crate::types::GroundError;

pub struct RestVectorIndex {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl RestVectorIndex {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: token.into(),
            timeout,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, GroundError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| GroundError::IndexBackend(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroundError::IndexBackend(format!(
                "vector index returned {} for /{path}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Deserialize)]
struct MatchMetadata {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default)]
    text: String,
}

fn default_page() -> u32 {
    1
}

#[async_trait]
impl VectorBackend for RestVectorIndex {
    async fn upsert(&self, doc_id: &str, index: Arc<DocumentIndex>) -> Result<(), GroundError> {
        if index.is_empty() {
            return Ok(());
        }

        let records: Vec<serde_json::Value> = index
            .chunks
            .iter()
            .zip(index.embeddings.iter())
            .map(|(chunk, embedding)| {
                json!({
                    "id": format!("{doc_id}::{}", chunk.id),
                    "vector": embedding,
                    "metadata": {
                        "docId": doc_id,
                        "page": chunk.page,
                        "text": chunk.text,
                    },
                })
            })
            .collect();

        debug!(doc_id, records = records.len(), "upserting document index");
        self.post("upsert", serde_json::Value::Array(records))
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        doc_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, GroundError> {
        let body = json!({
            "vector": query_embedding,
            "topK": top_k,
            "includeMetadata": true,
            "filter": format!("docId = '{}'", doc_id.replace('\'', "\\'")),
        });

        let response = self.post("query", body).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|err| GroundError::IndexBackend(err.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.unwrap_or(MatchMetadata {
                    page: 1,
                    text: String::new(),
                });
                RetrievalHit {
                    page: metadata.page,
                    text: metadata.text,
                    score: m.score,
                }
            })
            .collect())
    }
}
