//! Document extraction: page text, entities, tables, and summary.
//!
//! ```text
//! bytes ──► vision pass (when configured) ──► analysis text + summary
//!       └─► text-layer pages ──────────────► page-attributed text
//!
//! pages ──► entities::extract_entities ─┐
//!       └─► tables::extract_tables ─────┴─► DocumentExtraction
//! ```
//!
//! The vision pass reads the whole document in one shot, so everything it
//! finds is attributed to page 1; text-layer pages carry exact attribution.
//! When both run, their findings are merged and deduplicated.

pub mod entities;
pub mod facts;
pub mod tables;
pub mod vision;

pub use entities::{dedupe_entities, extract_entities, Entity, EntityKind};
pub use tables::{extract_tables, Table};
pub use vision::{VisionAnalysis, VisionExtractor};

use tracing::warn;

use crate::config::GroundingConfig;
use crate::ingestion::{pages_from_bytes, DocumentFetcher};
use crate::types::{GroundError, Page};

/// Everything recovered from one document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentExtraction {
    pub pages: Vec<Page>,
    pub entities: Vec<Entity>,
    pub tables: Vec<Table>,
    /// Short prose summary from the vision pass, empty without one.
    pub summary: String,
    /// Full recovered text: text-layer pages joined in order, or the vision
    /// transcription when no text layer exists.
    pub raw_text: String,
}

impl DocumentExtraction {
    /// Whether the document yielded any usable content.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.pages.is_empty() || !self.summary.is_empty()
    }
}

/// Runs the text-only extraction pass over already-recovered pages.
#[must_use]
pub fn extract_document(pages: &[Page]) -> DocumentExtraction {
    let mut entities = Vec::new();
    let mut tables = Vec::new();
    for page in pages {
        entities.extend(extract_entities(&page.text, page.number));
        tables.extend(extract_tables(&page.text, page.number));
    }

    let raw_text = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    DocumentExtraction {
        pages: pages.to_vec(),
        entities: dedupe_entities(entities),
        tables,
        summary: String::new(),
        raw_text,
    }
}

/// Fetches a document and runs the full extraction strategy chain.
pub struct DocumentExtractor {
    fetcher: DocumentFetcher,
    vision: Option<VisionExtractor>,
}

impl DocumentExtractor {
    #[must_use]
    pub fn from_config(config: &GroundingConfig) -> Self {
        let vision = match (&config.vision_model, &config.embedding_api_key) {
            (Some(model), Some(key)) => Some(VisionExtractor::new(
                config.completions_url.clone(),
                model.clone(),
                key.clone(),
                config.http_timeout,
            )),
            _ => None,
        };
        Self {
            fetcher: DocumentFetcher::new(config.http_timeout),
            vision,
        }
    }

    /// Fetches `url` and extracts content.
    ///
    /// The vision pass is best-effort: its failure is logged and the
    /// text-layer pass still runs. Only the fetch itself can fail.
    pub async fn extract(&self, url: &str) -> Result<DocumentExtraction, GroundError> {
        let bytes = self.fetcher.fetch(url).await?;

        let analysis = match &self.vision {
            Some(vision) => match vision.analyze(&bytes).await {
                Ok(analysis) => Some(analysis),
                Err(err) => {
                    warn!(url, %err, "vision pass failed, continuing with text layer");
                    None
                }
            },
            None => None,
        };

        let text_pages = pages_from_bytes(&bytes).await;
        let mut extraction = if text_pages.is_empty() {
            // No text layer: the vision transcription stands in as page 1.
            match &analysis {
                Some(a) => extract_document(&[Page::new(1, &a.text)]),
                None => DocumentExtraction::default(),
            }
        } else {
            let mut extraction = extract_document(&text_pages);
            if let Some(a) = &analysis {
                // Merge vision findings under page-1 attribution.
                let mut merged = extraction.entities;
                merged.extend(extract_entities(&a.text, 1));
                extraction.entities = dedupe_entities(merged);
                extraction.tables.extend(extract_tables(&a.text, 1));
            }
            extraction
        };

        if let Some(a) = analysis {
            extraction.summary = a.summary;
        }
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_pass_attributes_findings_to_their_pages() {
        let pages = vec![
            Page::new(1, "Buyback approved by Mr. Rakesh Kumar."),
            Page::new(2, "Metric | Value\nRevenue | 120 Cr"),
        ];
        let extraction = extract_document(&pages);

        assert!(extraction
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Person && e.page == 1));
        assert_eq!(extraction.tables.len(), 1);
        assert_eq!(extraction.tables[0].page, 2);
        assert!(extraction.raw_text.contains("Rakesh Kumar"));
        assert!(extraction.has_content());
    }

    #[test]
    fn cross_page_duplicates_collapse() {
        let pages = vec![
            Page::new(1, "price of ₹500 per share"),
            Page::new(2, "again ₹500 per share"),
        ];
        let extraction = extract_document(&pages);
        let amounts: Vec<_> = extraction
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Amount)
            .collect();
        assert_eq!(amounts.len(), 1);
    }

    #[test]
    fn empty_extraction_has_no_content() {
        assert!(!DocumentExtraction::default().has_content());
    }
}
