//! Entity detection over raw page text.
//!
//! Each entity family (persons, amounts, share counts, dates, percentages)
//! is an independent matcher function over a fixed battery of regex
//! patterns. Matches carry a per-family confidence weight; the composer
//! deduplicates by `(kind, lowercased value)` keeping the highest
//! confidence.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classification of an extracted entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Amount,
    Date,
    Shares,
    Percentage,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Amount => write!(f, "amount"),
            Self::Date => write!(f, "date"),
            Self::Shares => write!(f, "shares"),
            Self::Percentage => write!(f, "percentage"),
        }
    }
}

/// A structured fact pulled from page text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// Normalized value (e.g. the numeric part of an amount).
    pub value: String,
    /// The raw matched text.
    pub raw: String,
    pub page: u32,
    /// Fixed confidence weight of the pattern family, in [0, 1].
    pub confidence: f32,
}

const PERSON_CONFIDENCE: f32 = 0.9;
const DATE_CONFIDENCE: f32 = 0.9;
const AMOUNT_CONFIDENCE: f32 = 0.95;
const SHARES_CONFIDENCE: f32 = 0.95;
const PERCENTAGE_CONFIDENCE: f32 = 0.95;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("builtin entity pattern must compile"))
        .collect()
}

static PERSON_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // Honorific prefix.
        r"(?:Mr\.|Mrs\.|Ms\.|Dr\.|Shri|Smt\.?|Sh\.?)\s*([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,4})",
        // Name followed by a role.
        r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})\s*[-–]\s*(?:Director|Chairman|CEO|CFO|MD|Managing Director|Promoter|Investor|Shareholder)",
        // Labelled name field.
        r"(?:Name|Allottee|Investor|Shareholder|Client|Person|Director|Beneficiary)\s*[:\-]\s*([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})",
    ])
});

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)₹\s*([\d,]+(?:\.\d+)?)\s*(?:Cr|Crore|Crores|Lakh|Lakhs|Million|Billion)?",
        r"(?i)Rs\.?\s*([\d,]+(?:\.\d+)?)\s*(?:Cr|Crore|Crores|Lakh|Lakhs|Million|Billion)?",
        r"(?i)INR\s*([\d,]+(?:\.\d+)?)\s*(?:Cr|Crore|Crores|Lakh|Lakhs|Million|Billion)?",
        r"(?i)([\d,]+(?:\.\d+)?)\s*(?:Crore|Crores|Lakh|Lakhs)\s*(?:rupees)?",
    ])
});

static SHARE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)([\d,]+)\s*(?:equity\s+|preference\s+)?shares",
        r"(?i)([\d,]+)\s*(?:equity|preference)\s+securities",
        r"(?i)(?:total|aggregate|upto|up\s+to)\s+([\d,]+)\s+shares",
    ])
});

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
        r"(?i)(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*[\s,]+\d{2,4})",
        r"(?i)(?:Record\s+Date|Ex-Date|Payment\s+Date|Effective\s+Date)\s*[:\-]?\s*(\d{1,2}[-/\s][A-Za-z]+[-/\s]\d{2,4})",
    ])
});

static PERCENTAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"([\d.]+)\s*%", r"(?i)([\d.]+)\s*percent"])
});

fn capture_matches(
    patterns: &[Regex],
    text: &str,
    page: u32,
    kind: EntityKind,
    confidence: f32,
) -> Vec<Entity> {
    let mut entities = Vec::new();
    for pattern in patterns {
        for captures in pattern.captures_iter(text) {
            let raw = captures
                .get(0)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let value = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| raw.clone());
            if value.is_empty() {
                continue;
            }
            entities.push(Entity {
                kind,
                value,
                raw,
                page,
                confidence,
            });
        }
    }
    entities
}

/// Person names: ≥2 capitalized tokens anchored to an honorific, role, or
/// label context, between 6 and 59 characters.
pub fn match_persons(text: &str, page: u32) -> Vec<Entity> {
    capture_matches(&PERSON_PATTERNS, text, page, EntityKind::Person, PERSON_CONFIDENCE)
        .into_iter()
        .filter(|e| {
            let words: Vec<&str> = e.value.split_whitespace().collect();
            e.value.len() > 5
                && e.value.len() < 60
                && words.len() >= 2
                && words.iter().all(|w| {
                    let mut chars = w.chars();
                    chars.next().is_some_and(|c| c.is_ascii_uppercase())
                        && chars.all(|c| c.is_ascii_lowercase())
                })
        })
        .collect()
}

/// Currency amounts with optional Cr/Lakh/Million/Billion unit suffixes.
pub fn match_amounts(text: &str, page: u32) -> Vec<Entity> {
    capture_matches(&AMOUNT_PATTERNS, text, page, EntityKind::Amount, AMOUNT_CONFIDENCE)
}

/// Share-count phrases.
pub fn match_shares(text: &str, page: u32) -> Vec<Entity> {
    capture_matches(&SHARE_PATTERNS, text, page, EntityKind::Shares, SHARES_CONFIDENCE)
}

/// Numeric and month-name date phrases.
pub fn match_dates(text: &str, page: u32) -> Vec<Entity> {
    capture_matches(&DATE_PATTERNS, text, page, EntityKind::Date, DATE_CONFIDENCE)
}

/// Percentage figures.
pub fn match_percentages(text: &str, page: u32) -> Vec<Entity> {
    capture_matches(
        &PERCENTAGE_PATTERNS,
        text,
        page,
        EntityKind::Percentage,
        PERCENTAGE_CONFIDENCE,
    )
}

/// Runs every entity family over one page of text and deduplicates.
pub fn extract_entities(text: &str, page: u32) -> Vec<Entity> {
    let mut all = Vec::new();
    all.extend(match_persons(text, page));
    all.extend(match_amounts(text, page));
    all.extend(match_shares(text, page));
    all.extend(match_dates(text, page));
    all.extend(match_percentages(text, page));
    dedupe_entities(all)
}

/// Collapses entities by `(kind, lowercased value)`, keeping the entry with
/// the highest confidence. A higher-confidence entity is never dropped in
/// favor of a lower-confidence one of the same key.
pub fn dedupe_entities(entities: Vec<Entity>) -> Vec<Entity> {
    let mut best: HashMap<(EntityKind, String), Entity> = HashMap::new();
    let mut order: Vec<(EntityKind, String)> = Vec::new();

    for entity in entities {
        let key = (entity.kind, entity.value.to_lowercase());
        match best.get(&key) {
            Some(existing) if existing.confidence >= entity.confidence => {}
            Some(_) => {
                best.insert(key, entity);
            }
            None => {
                order.push(key.clone());
                best.insert(key, entity);
            }
        }
    }

    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtin_patterns_compile() {
        // Forcing the LazyLocks is enough; compile() panics on a bad pattern.
        assert!(!PERSON_PATTERNS.is_empty());
        assert!(!AMOUNT_PATTERNS.is_empty());
        assert!(!SHARE_PATTERNS.is_empty());
        assert!(!DATE_PATTERNS.is_empty());
        assert!(!PERCENTAGE_PATTERNS.is_empty());
    }

    #[test]
    fn honorific_names_are_detected() {
        let entities = match_persons("Allotment approved for Mr. Rakesh Kumar on Monday.", 2);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].value, "Rakesh Kumar");
        assert_eq!(entities[0].page, 2);
        assert!((entities[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn single_word_names_are_rejected() {
        let entities = match_persons("Approved by Mr. Rakesh himself.", 1);
        assert!(entities.is_empty());
    }

    #[test]
    fn amounts_capture_numeric_value_and_raw_text() {
        let entities = match_amounts("The buyback size is ₹ 1,250.50 Cr in total.", 1);
        assert_eq!(entities[0].value, "1,250.50");
        assert!(entities[0].raw.starts_with('₹'));
        assert!((entities[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn share_counts_and_percentages_are_detected() {
        let shares = match_shares("up to 4,00,00,000 equity shares", 1);
        assert_eq!(shares[0].value, "4,00,00,000");

        let pcts = match_percentages("representing 2.5% of paid-up capital", 1);
        assert_eq!(pcts[0].value, "2.5");
    }

    #[test]
    fn both_date_forms_are_detected() {
        let numeric = match_dates("Ex-date is 12/03/2024 for the dividend.", 1);
        assert_eq!(numeric[0].value, "12/03/2024");

        let spelled = match_dates("payable on 15 March 2024 to holders", 1);
        assert_eq!(spelled[0].value, "15 March 2024");
    }

    #[test]
    fn dedup_keeps_highest_confidence() {
        let low = Entity {
            kind: EntityKind::Amount,
            value: "5.48".to_string(),
            raw: "5.48 Crore".to_string(),
            page: 1,
            confidence: 0.6,
        };
        let high = Entity {
            kind: EntityKind::Amount,
            value: "5.48".to_string(),
            raw: "₹5.48".to_string(),
            page: 2,
            confidence: 0.95,
        };

        let deduped = dedupe_entities(vec![low.clone(), high.clone()]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0], high);

        // Order of arrival must not matter.
        let deduped = dedupe_entities(vec![high.clone(), low]);
        assert_eq!(deduped[0], high);
    }

    #[test]
    fn dedup_is_scoped_by_kind() {
        let amount = Entity {
            kind: EntityKind::Amount,
            value: "100".to_string(),
            raw: "₹100".to_string(),
            page: 1,
            confidence: 0.95,
        };
        let shares = Entity {
            kind: EntityKind::Shares,
            value: "100".to_string(),
            raw: "100 shares".to_string(),
            page: 1,
            confidence: 0.95,
        };
        assert_eq!(dedupe_entities(vec![amount, shares]).len(), 2);
    }
}
