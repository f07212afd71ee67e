//! Citation assembly: evidence records pointing a reader at the exact page.
//!
//! Every answer-bearing statement carries at least one [`Citation`] with a
//! page number, a bounded snippet, and a deep link (`<url>#page=<n>`) that
//! opens the source document at the cited page.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::rerank::RerankedHit;
use crate::stores::RetrievalHit;

/// Snippets are bounded to this many grapheme clusters.
pub const MAX_SNIPPET_GRAPHEMES: usize = 400;

/// An evidence record tying a statement back to a source page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub page: u32,
    pub snippet: String,
    /// Deep link of the form `<document url>#page=<page>`.
    pub open_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

impl Citation {
    /// Citation for a reranked passage.
    pub fn from_reranked(hit: &RerankedHit, doc_url: &str) -> Self {
        Self {
            page: hit.page,
            snippet: truncate_snippet(&hit.text),
            open_url: page_link(doc_url, hit.page),
            score: Some(hit.relevance_score),
            doc_id: None,
            headline: None,
        }
    }

    /// Citation for a raw retrieval hit (no rerank pass).
    pub fn from_hit(hit: &RetrievalHit, doc_url: &str) -> Self {
        Self {
            page: hit.page,
            snippet: truncate_snippet(&hit.text),
            open_url: page_link(doc_url, hit.page),
            score: Some(hit.score),
            doc_id: None,
            headline: None,
        }
    }

    /// Citation for a deterministically extracted fact.
    pub fn from_fact(page: u32, snippet: &str, doc_url: &str) -> Self {
        Self {
            page,
            snippet: truncate_snippet(snippet),
            open_url: page_link(doc_url, page),
            score: None,
            doc_id: None,
            headline: None,
        }
    }

    /// Attaches multi-document provenance fields.
    #[must_use]
    pub fn with_source(mut self, doc_id: impl Into<String>, headline: Option<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self.headline = headline;
        self
    }
}

/// Deep link opening `url` at `page`.
#[must_use]
pub fn page_link(url: &str, page: u32) -> String {
    format!("{url}#page={page}")
}

/// Truncates to [`MAX_SNIPPET_GRAPHEMES`] grapheme clusters, never splitting
/// a cluster.
#[must_use]
pub fn truncate_snippet(text: &str) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(MAX_SNIPPET_GRAPHEMES) {
        Some((byte_offset, _)) => text[..byte_offset].to_string(),
        None => text.to_string(),
    }
}
