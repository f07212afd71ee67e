//! Document fetching and page-text recovery.
//!
//! [`DocumentFetcher`] downloads disclosure documents with browser-like
//! headers (some disclosure hosts reject default client UAs). Page text is
//! recovered by strategy: PDF bytes go through a `pdftotext` subprocess
//! whose output is split on form feeds, one [`Page`] per sheet; plain-text
//! payloads are split on form feeds directly. Text recovery never errors —
//! a document that yields no text simply contributes no pages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::{GroundError, Page};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REFERER: &str = "https://www.bseindia.com/";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// HTTP fetcher for source documents.
pub struct DocumentFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl DocumentFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Downloads the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`GroundError::Fetch`] on transport failures or non-success
    /// status codes.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, GroundError> {
        let url = url::Url::parse(url)
            .map_err(|err| GroundError::Fetch(format!("invalid document url: {err}")))?;

        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", USER_AGENT)
            .header("Referer", REFERER)
            .header("Accept", "application/pdf,application/octet-stream,*/*")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| GroundError::Fetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroundError::Fetch(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| GroundError::Fetch(err.to_string()))?;
        debug!(url = %url, len = bytes.len(), "fetched document");
        Ok(bytes.to_vec())
    }
}

/// Recovers page text from raw document bytes.
///
/// PDFs (leading `%PDF`) go through `pdftotext`; anything that decodes as
/// UTF-8 is treated as pre-extracted text. Binary payloads that are neither
/// yield no pages.
pub async fn pages_from_bytes(bytes: &[u8]) -> Vec<Page> {
    if bytes.starts_with(b"%PDF") {
        match pdftotext(bytes).await {
            Ok(text) => {
                let pages = pages_from_text(&text);
                if !pages.is_empty() {
                    return pages;
                }
                warn!("pdftotext produced no text, trying plain-text decode");
            }
            Err(err) => {
                warn!(%err, "pdftotext failed, trying plain-text decode");
            }
        }
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => pages_from_text(text),
        Err(_) => Vec::new(),
    }
}

/// Splits extracted text on form feeds into 1-based pages, dropping pages
/// that are empty after trimming.
#[must_use]
pub fn pages_from_text(text: &str) -> Vec<Page> {
    text.split('\u{0c}')
        .enumerate()
        .filter_map(|(i, sheet)| {
            let trimmed = sheet.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Page::new(i as u32 + 1, trimmed))
            }
        })
        .collect()
}

async fn pdftotext(bytes: &[u8]) -> Result<String, GroundError> {
    let path = std::env::temp_dir().join(format!(
        "citesmith-{}-{}.pdf",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|err| GroundError::Extraction(err.to_string()))?;

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(&path)
        .arg("-")
        .output()
        .await;
    let _ = tokio::fs::remove_file(&path).await;

    let output = output.map_err(|err| GroundError::Extraction(err.to_string()))?;
    if !output.status.success() {
        return Err(GroundError::Extraction(format!(
            "pdftotext exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
