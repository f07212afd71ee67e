//! Splits page-attributed raw text into bounded, page-tagged chunks.
//!
//! Chunking is a pure function: the same pages always yield the same chunk
//! sequence, which makes downstream indexing memoizable per document.

use serde::{Deserialize, Serialize};

/// A bounded slice of one page's text.
///
/// The id is `"{page}-{part}"` where `part` increases monotonically within a
/// page. Chunks are never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// 1-based page number of the source page.
    pub page: u32,
    pub text: String,
}

use crate::types::Page;

/// Splits pages into chunks of at most `max_chars` characters.
///
/// Whitespace is collapsed to single spaces before splitting. A page whose
/// collapsed text fits in `max_chars` becomes exactly one chunk; longer pages
/// are split greedily at fixed character boundaries. Empty pages produce no
/// chunks. Boundaries are counted in characters, never bytes, so multibyte
/// text is split safely.
pub fn chunk_pages(pages: &[Page], max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for page in pages {
        let text = collapse_whitespace(&page.text);
        if text.is_empty() {
            continue;
        }

        if text.chars().count() <= max_chars {
            chunks.push(Chunk {
                id: format!("{}-0", page.number),
                page: page.number,
                text,
            });
            continue;
        }

        let chars: Vec<char> = text.chars().collect();
        for (part, window) in chars.chunks(max_chars).enumerate() {
            chunks.push(Chunk {
                id: format!("{}-{}", page.number, part),
                page: page.number,
                text: window.iter().collect(),
            });
        }
    }

    chunks
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
