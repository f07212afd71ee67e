//! End-to-end grounding: documents + question in, evidence out.
//!
//! ```text
//! ground(question, docs)
//!   │ fan out per doc: fetch ► extract (vision/text) ► DocumentExtraction
//!   │ deterministic facts over the extracted pages ──► short-circuit answer
//!   │ otherwise: embed query once ► ensure_indexed + top_k per doc
//!   │ rerank per doc ► merge best-first ► Citations
//!   ▼
//! GroundingOutcome
//! ```
//!
//! Failure posture: a document that cannot be fetched or extracted
//! contributes nothing but never fails the whole request; an embedding
//! failure aborts retrieval only, leaving extraction output intact. The
//! request as a whole only reports [`GroundingOutcome::NoContent`] when no
//! document yielded pages, a summary, or a headline.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::citations::Citation;
use crate::config::GroundingConfig;
use crate::embeddings::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::extract::facts::{answer_deterministic, extract_facts, DeterministicAnswer};
use crate::extract::{dedupe_entities, DocumentExtraction, DocumentExtractor, Entity, Table};
use crate::rerank::{HttpReranker, LexicalReranker, RerankedHit, Reranker};
use crate::retriever::Retriever;

/// Answer text returned to callers when no source document had content.
pub const NO_CONTENT_SIGNAL: &str = "not specified in the provided data";

fn non_empty(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

/// A source document to ground against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDocument {
    pub id: String,
    pub url: String,
    pub headline: Option<String>,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            headline: None,
        }
    }

    #[must_use]
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }
}

/// Evidence assembled for a downstream answer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroundedContext {
    /// Reranked, page-anchored evidence, best first.
    pub citations: Vec<Citation>,
    pub entities: Vec<Entity>,
    pub tables: Vec<Table>,
    /// One vision summary per document that produced one.
    pub summaries: Vec<String>,
    /// Caller-supplied headlines of the documents that carried one. A
    /// headline alone is answerable content even when extraction yields
    /// no pages.
    pub headlines: Vec<String>,
}

/// Result of one grounding request.
#[derive(Clone, Debug, PartialEq)]
pub enum GroundingOutcome {
    /// A fact template answered the question directly; no model call needed.
    Deterministic(DeterministicAnswer),
    /// Evidence for a downstream model call.
    Grounded(GroundedContext),
    /// No document yielded content; callers should answer with
    /// [`NO_CONTENT_SIGNAL`].
    NoContent,
}

pub struct GroundingPipeline {
    config: GroundingConfig,
    retriever: Arc<Retriever>,
    reranker: Arc<dyn Reranker>,
    extractor: DocumentExtractor,
}

impl GroundingPipeline {
    /// Wires the pipeline from configuration: HTTP embeddings, the remote
    /// index when configured, and the HTTP reranker when a rerank credential
    /// is present (lexical otherwise).
    #[must_use]
    pub fn from_config(config: GroundingConfig) -> Self {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
            config.http_timeout,
        ));
        let reranker: Arc<dyn Reranker> = match &config.rerank_api_key {
            Some(key) => Arc::new(HttpReranker::new(
                config.rerank_url.clone(),
                config.rerank_model.clone(),
                key.clone(),
                config.http_timeout,
            )),
            None => Arc::new(LexicalReranker::new()),
        };
        let retriever = Arc::new(Retriever::from_config(&config, embedder));
        let extractor = DocumentExtractor::from_config(&config);
        Self {
            config,
            retriever,
            reranker,
            extractor,
        }
    }

    /// Builds a pipeline around injected parts. Used by tests that substitute
    /// deterministic embedders and rerankers.
    pub fn new(
        config: GroundingConfig,
        retriever: Arc<Retriever>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        let extractor = DocumentExtractor::from_config(&config);
        Self {
            config,
            retriever,
            reranker,
            extractor,
        }
    }

    /// Grounds `question` against `docs`, fetching and extracting each one.
    pub async fn ground(&self, question: &str, docs: &[SourceDocument]) -> GroundingOutcome {
        let extractions = join_all(docs.iter().map(|doc| async move {
            match self.extractor.extract(&doc.url).await {
                Ok(extraction) => extraction,
                Err(err) => {
                    warn!(doc_id = %doc.id, %err, "document unavailable, skipping");
                    DocumentExtraction::default()
                }
            }
        }))
        .await;

        self.ground_extracted(question, docs, &extractions).await
    }

    /// Grounds against documents whose extraction already happened. This is
    /// the network-free core of [`GroundingPipeline::ground`].
    pub async fn ground_extracted(
        &self,
        question: &str,
        docs: &[SourceDocument],
        extractions: &[DocumentExtraction],
    ) -> GroundingOutcome {
        debug_assert_eq!(docs.len(), extractions.len());

        // A non-empty headline is content on its own: a document whose fetch
        // failed can still be answered from what the caller knows about it.
        let any_content = docs.iter().zip(extractions).any(|(doc, extraction)| {
            extraction.has_content() || non_empty(doc.headline.as_deref())
        });
        if !any_content {
            return GroundingOutcome::NoContent;
        }
        let multi = docs.len() > 1;

        // Deterministic short-circuit: first document whose facts answer the
        // question wins, scanning in caller order.
        for (doc, extraction) in docs.iter().zip(extractions) {
            if extraction.pages.is_empty() {
                continue;
            }
            let facts = extract_facts(&extraction.pages);
            if let Some(mut answer) = answer_deterministic(&facts, question, &doc.url) {
                info!(doc_id = %doc.id, "fact template answered the question");
                if multi {
                    answer.citations = answer
                        .citations
                        .into_iter()
                        .map(|c| c.with_source(doc.id.clone(), doc.headline.clone()))
                        .collect();
                }
                return GroundingOutcome::Deterministic(answer);
            }
        }

        let mut context = GroundedContext::default();
        let mut entities = Vec::new();
        for (doc, extraction) in docs.iter().zip(extractions) {
            entities.extend(extraction.entities.clone());
            context.tables.extend(extraction.tables.clone());
            if !extraction.summary.is_empty() {
                context.summaries.push(extraction.summary.clone());
            }
            if let Some(headline) = doc.headline.as_deref() {
                if !headline.trim().is_empty() {
                    context.headlines.push(headline.to_string());
                }
            }
        }
        context.entities = dedupe_entities(entities);

        let query = match self.retriever.embed_query(question).await {
            Ok(query) => query,
            Err(err) => {
                // Extraction output is still useful without retrieval.
                warn!(%err, "query embedding failed, returning evidence without retrieval");
                return GroundingOutcome::Grounded(context);
            }
        };

        let top_k = if multi {
            self.config.top_k_multi
        } else {
            self.config.top_k
        };
        let rerank_n = if multi {
            self.config.rerank_top_n_multi
        } else {
            self.config.rerank_top_n
        };

        let per_doc = join_all(docs.iter().zip(extractions).map(|(doc, extraction)| {
            let query = query.clone();
            async move {
                if extraction.pages.is_empty() {
                    return (doc, Vec::new());
                }
                if let Err(err) = self
                    .retriever
                    .ensure_indexed(&doc.id, &extraction.pages)
                    .await
                {
                    warn!(doc_id = %doc.id, %err, "indexing failed, skipping document");
                    return (doc, Vec::new());
                }
                match self.retriever.top_k(&doc.id, &query, top_k).await {
                    Ok(hits) => (doc, hits),
                    Err(err) => {
                        warn!(doc_id = %doc.id, %err, "retrieval failed, skipping document");
                        (doc, Vec::new())
                    }
                }
            }
        }))
        .await;

        let mut reranked: Vec<(&SourceDocument, RerankedHit)> = Vec::new();
        for (doc, hits) in per_doc {
            if hits.is_empty() {
                continue;
            }
            match self.reranker.rerank(question, &hits, rerank_n).await {
                Ok(scored) => reranked.extend(scored.into_iter().map(|h| (doc, h))),
                Err(err) => {
                    warn!(doc_id = %doc.id, %err, "rerank failed, skipping document");
                }
            }
        }

        // Merge across documents best-first; the sort is stable so equal
        // scores keep document order.
        reranked.sort_by(|a, b| {
            b.1.relevance_score
                .partial_cmp(&a.1.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(rerank_n);

        context.citations = reranked
            .into_iter()
            .map(|(doc, hit)| {
                let citation = Citation::from_reranked(&hit, &doc.url);
                if multi {
                    citation.with_source(doc.id.clone(), doc.headline.clone())
                } else {
                    citation
                }
            })
            .collect();

        GroundingOutcome::Grounded(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::extract::extract_document;
    use crate::types::Page;

    fn pipeline() -> GroundingPipeline {
        let config = GroundingConfig::default();
        let retriever = Arc::new(Retriever::from_config(
            &config,
            Arc::new(MockEmbeddingProvider::new()),
        ));
        GroundingPipeline::new(config, retriever, Arc::new(LexicalReranker::new()))
    }

    fn doc(id: &str) -> SourceDocument {
        SourceDocument::new(id, format!("https://example.com/{id}.pdf"))
    }

    fn extraction(pages: Vec<Page>) -> DocumentExtraction {
        extract_document(&pages)
    }

    #[tokio::test]
    async fn empty_documents_signal_no_content() {
        let pipeline = pipeline();
        let outcome = pipeline
            .ground_extracted(
                "what is the record date?",
                &[doc("a")],
                &[DocumentExtraction::default()],
            )
            .await;
        assert_eq!(outcome, GroundingOutcome::NoContent);
    }

    #[tokio::test]
    async fn headline_only_documents_still_ground() {
        let pipeline = pipeline();
        let docs = vec![doc("a").with_headline("Board approves buyback at ₹1,250")];
        let outcome = pipeline
            .ground_extracted(
                "what did the board approve?",
                &docs,
                &[DocumentExtraction::default()],
            )
            .await;

        let GroundingOutcome::Grounded(context) = outcome else {
            panic!("headline-bearing document must not report NoContent");
        };
        assert!(context.citations.is_empty());
        assert_eq!(
            context.headlines,
            vec!["Board approves buyback at ₹1,250".to_string()]
        );
    }

    #[tokio::test]
    async fn blank_headlines_do_not_count_as_content() {
        let pipeline = pipeline();
        let docs = vec![doc("a").with_headline("   ")];
        let outcome = pipeline
            .ground_extracted("anything?", &docs, &[DocumentExtraction::default()])
            .await;
        assert_eq!(outcome, GroundingOutcome::NoContent);
    }

    #[tokio::test]
    async fn fact_questions_short_circuit_retrieval() {
        let pipeline = pipeline();
        let pages = vec![Page::new(2, "Record Date : 15-Mar-2024")];
        let outcome = pipeline
            .ground_extracted("what is the record date?", &[doc("a")], &[extraction(pages)])
            .await;

        let GroundingOutcome::Deterministic(answer) = outcome else {
            panic!("expected deterministic outcome");
        };
        assert!(answer.response.contains("15-Mar-2024"));
        assert_eq!(answer.citations[0].page, 2);
        assert!(answer.citations[0].open_url.ends_with("#page=2"));
        // Single-document mode carries no provenance fields.
        assert!(answer.citations[0].doc_id.is_none());
    }

    #[tokio::test]
    async fn open_questions_produce_reranked_citations() {
        let pipeline = pipeline();
        let pages = vec![
            Page::new(1, "The board met on Thursday to discuss routine matters."),
            Page::new(2, "The promoter group will tender shares in the offer."),
        ];
        let outcome = pipeline
            .ground_extracted(
                "will the promoter group tender shares?",
                &[doc("a")],
                &[extraction(pages)],
            )
            .await;

        let GroundingOutcome::Grounded(context) = outcome else {
            panic!("expected grounded outcome");
        };
        assert!(!context.citations.is_empty());
        assert_eq!(context.citations[0].page, 2, "overlapping page cited first");
        assert!(context.citations[0].open_url.contains("#page=2"));
        assert!(context
            .citations
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn multi_document_citations_carry_provenance() {
        let pipeline = pipeline();
        let docs = vec![
            doc("a").with_headline("Buyback notice"),
            doc("b").with_headline("Quarterly results"),
        ];
        let extractions = vec![
            extraction(vec![Page::new(1, "buyback offer details and schedule")]),
            extraction(vec![Page::new(1, "quarterly revenue commentary and outlook")]),
        ];
        let outcome = pipeline
            .ground_extracted("what was the quarterly revenue commentary?", &docs, &extractions)
            .await;

        let GroundingOutcome::Grounded(context) = outcome else {
            panic!("expected grounded outcome");
        };
        assert!(!context.citations.is_empty());
        assert!(context.citations.iter().all(|c| c.doc_id.is_some()));
        assert_eq!(context.citations[0].doc_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn one_unavailable_document_does_not_fail_the_request() {
        let pipeline = pipeline();
        let docs = vec![doc("gone"), doc("here")];
        let extractions = vec![
            DocumentExtraction::default(),
            extraction(vec![Page::new(1, "the dividend schedule spans two months")]),
        ];
        let outcome = pipeline
            .ground_extracted("what is the dividend schedule?", &docs, &extractions)
            .await;

        let GroundingOutcome::Grounded(context) = outcome else {
            panic!("expected grounded outcome");
        };
        assert!(context
            .citations
            .iter()
            .all(|c| c.doc_id.as_deref() == Some("here")));
    }

    #[tokio::test]
    async fn extraction_entities_survive_into_the_context() {
        let pipeline = pipeline();
        let pages = vec![Page::new(
            1,
            "The offer covers 4,00,000 equity shares at ₹750 with the promoter tendering 2.5%.",
        )];
        let outcome = pipeline
            .ground_extracted("describe the offer structure", &[doc("a")], &[extraction(pages)])
            .await;

        let GroundingOutcome::Grounded(context) = outcome else {
            panic!("expected grounded outcome");
        };
        assert!(!context.entities.is_empty());
    }
}
