//! Deterministic fact extraction and short-circuit answers.
//!
//! Three template groups (buyback, capacity, quarterly results) are scanned
//! page by page. The first page match wins per fact; a group stops scanning
//! once every one of its facts is found. When a question's intent maps onto
//! an extracted fact, the answer is synthesized directly with a citation to
//! the fact's page and no model call is made.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::citations::Citation;
use crate::types::Page;

/// One extracted fact: normalized value, source page, and the matched text
/// used as the citation snippet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub value: String,
    pub page: u32,
    pub context: String,
}

/// Facts recovered by the template groups. Every field is independent; a
/// document typically fills only one group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFacts {
    pub record_date: Option<Fact>,
    pub buyback_price: Option<Fact>,
    pub current_capacity_mw: Option<Fact>,
    pub increased_capacity_mw: Option<Fact>,
    pub revenue: Option<Fact>,
    pub pat: Option<Fact>,
    pub eps: Option<Fact>,
    pub period: Option<Fact>,
}

/// A fully formed answer produced without any model call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeterministicAnswer {
    pub response: String,
    pub citations: Vec<Citation>,
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("builtin fact pattern must compile")
}

static RECORD_DATE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)Record\s+Date\s*[:\-]?\s*([A-Za-z0-9,\-/ ]{3,40}?)(?:\s{2,}|\n|\.|$)"));
static BUYBACK_PRICE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)Buy[-\s]?back\s+Price\s*[:\-]?\s*₹?\s*([\d,]+(?:\.\d+)?)"));

static CURRENT_CAPACITY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)current\s+(?:commercial\s+)?(?:operational\s+)?capacity\s+[A-Za-z\s]*stands\s+at\s+([\d,]+(?:\.\d+)?)\s*MW")
});
static CURRENT_CAPACITY_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)stands\s+at\s+([\d,]+(?:\.\d+)?)\s*MW"));
static INCREASED_CAPACITY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)total\s+installed\s+capacity\s+[A-Za-z\s]*will\s+increase\s+to\s+([\d,]+(?:\.\d+)?)\s*MW")
});
static INCREASED_CAPACITY_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)increase\s+to\s+([\d,]+(?:\.\d+)?)\s*MW"));

static REVENUE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:Total\s+)?(?:Revenue|Turnover)(?:\s+from\s+Operations)?\s*[:\-]?\s*₹?\s*([\d,]+(?:\.\d+)?)\s*(?:Cr|Crore|Crores|Lakh|Lakhs|Mn|Million)?")
});
static PAT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:Profit\s+After\s+Tax|PAT|Net\s+Profit)\s*[:\-]?\s*₹?\s*([\d,]+(?:\.\d+)?)\s*(?:Cr|Crore|Crores|Lakh|Lakhs|Mn|Million)?")
});
static EPS: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:EPS|Earnings\s+Per\s+Share)\s*(?:\(₹\))?\s*[:\-]?\s*₹?\s*([\d,]+(?:\.\d+)?)")
});
static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(Q[1-4]\s*FY\s*\d{2,4}|Quarter\s+ended\s+[A-Za-z]+\s+\d{4}|(?:First|Second|Third|Fourth)\s+Quarter)")
});

fn first_match(regex: &Regex, page: &Page) -> Option<Fact> {
    regex.captures(&page.text).map(|captures| {
        let whole = captures.get(0).map(|m| m.as_str().trim()).unwrap_or("");
        let value = captures
            .get(1)
            .map(|m| m.as_str().trim())
            .unwrap_or(whole);
        Fact {
            value: value.to_string(),
            page: page.number,
            context: whole.to_string(),
        }
    })
}

fn first_match_with_fallback(primary: &Regex, fallback: &Regex, page: &Page) -> Option<Fact> {
    first_match(primary, page).or_else(|| first_match(fallback, page))
}

/// Scans pages in order, filling each fact from its first matching page.
/// Each template group stops scanning once complete.
pub fn extract_facts(pages: &[Page]) -> DocumentFacts {
    let mut facts = DocumentFacts::default();

    for page in pages {
        if facts.record_date.is_none() {
            facts.record_date = first_match(&RECORD_DATE, page);
        }
        if facts.buyback_price.is_none() {
            facts.buyback_price = first_match(&BUYBACK_PRICE, page);
        }
        if facts.record_date.is_some() && facts.buyback_price.is_some() {
            break;
        }
    }

    for page in pages {
        if facts.current_capacity_mw.is_none() {
            facts.current_capacity_mw =
                first_match_with_fallback(&CURRENT_CAPACITY, &CURRENT_CAPACITY_FALLBACK, page);
        }
        if facts.increased_capacity_mw.is_none() {
            facts.increased_capacity_mw =
                first_match_with_fallback(&INCREASED_CAPACITY, &INCREASED_CAPACITY_FALLBACK, page);
        }
        if facts.current_capacity_mw.is_some() && facts.increased_capacity_mw.is_some() {
            break;
        }
    }

    for page in pages {
        if facts.revenue.is_none() {
            facts.revenue = first_match(&REVENUE, page);
        }
        if facts.pat.is_none() {
            facts.pat = first_match(&PAT, page);
        }
        if facts.eps.is_none() {
            facts.eps = first_match(&EPS, page);
        }
        if facts.period.is_none() {
            facts.period = first_match(&PERIOD, page);
        }
        if facts.revenue.is_some()
            && facts.pat.is_some()
            && facts.eps.is_some()
            && facts.period.is_some()
        {
            break;
        }
    }

    facts
}

fn has_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|t| t.eq_ignore_ascii_case(word))
}

fn period_suffix(facts: &DocumentFacts) -> String {
    facts
        .period
        .as_ref()
        .map(|p| format!(" ({})", p.value))
        .unwrap_or_default()
}

fn fact_answer(fact: &Fact, response: String, doc_url: &str) -> DeterministicAnswer {
    DeterministicAnswer {
        response,
        citations: vec![Citation::from_fact(fact.page, &fact.context, doc_url)],
    }
}

fn numeric(value: &str) -> Option<f64> {
    value.replace(',', "").parse().ok()
}

/// Renders revenue/PAT/EPS as a markdown table with text bars scaled to the
/// largest value (ten cells max, at least one). Rows are ordered largest
/// value first.
fn metrics_chart(facts: &DocumentFacts, doc_url: &str) -> Option<DeterministicAnswer> {
    let mut rows: Vec<(&str, &Fact, f64)> = [
        ("Revenue", facts.revenue.as_ref()),
        ("PAT", facts.pat.as_ref()),
        ("EPS", facts.eps.as_ref()),
    ]
    .into_iter()
    .filter_map(|(label, fact)| {
        fact.and_then(|f| numeric(&f.value).map(|n| (label, f, n)))
    })
    .collect();

    if rows.is_empty() {
        return None;
    }
    rows.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let max = rows[0].2.max(f64::EPSILON);
    let period = period_suffix(facts);
    let mut response = format!("| Metric{period} | Value | Chart |\n|---|---|---|\n");
    let mut citations = Vec::new();

    for (label, fact, value) in rows {
        let cells = ((value / max * 10.0).round() as usize).max(1);
        response.push_str(&format!(
            "| {label} | ₹{} | {} |\n",
            fact.value,
            "█".repeat(cells)
        ));
        citations.push(Citation::from_fact(fact.page, &fact.context, doc_url));
    }

    Some(DeterministicAnswer {
        response,
        citations,
    })
}

/// Maps question intent onto extracted facts. Returns `None` when no fact
/// answers the question, in which case the retrieval path runs instead.
pub fn answer_deterministic(
    facts: &DocumentFacts,
    question: &str,
    doc_url: &str,
) -> Option<DeterministicAnswer> {
    let q = question.to_lowercase();

    if q.contains("record date") {
        if let Some(fact) = &facts.record_date {
            return Some(fact_answer(
                fact,
                format!("The record date is {}.", fact.value),
                doc_url,
            ));
        }
    }

    if (q.contains("buyback") || q.contains("buy-back") || q.contains("buy back"))
        && q.contains("price")
    {
        if let Some(fact) = &facts.buyback_price {
            return Some(fact_answer(
                fact,
                format!("The buyback price is ₹{} per share.", fact.value),
                doc_url,
            ));
        }
    }

    if q.contains("capacity") || has_word(&q, "mw") {
        let wants_increase =
            q.contains("increase") || q.contains("total installed") || q.contains("will become");
        if wants_increase {
            if let Some(fact) = &facts.increased_capacity_mw {
                return Some(fact_answer(
                    fact,
                    format!("The total installed capacity will increase to {} MW.", fact.value),
                    doc_url,
                ));
            }
        } else if let Some(fact) = &facts.current_capacity_mw {
            return Some(fact_answer(
                fact,
                format!("The current capacity stands at {} MW.", fact.value),
                doc_url,
            ));
        }
    }

    if q.contains("chart") || q.contains("graph") || q.contains("visuali") {
        if let Some(answer) = metrics_chart(facts, doc_url) {
            return Some(answer);
        }
    }

    if q.contains("revenue") || q.contains("turnover") || q.contains("income from operations") {
        if let Some(fact) = &facts.revenue {
            return Some(fact_answer(
                fact,
                format!("Revenue was ₹{}{}.", fact.value, period_suffix(facts)),
                doc_url,
            ));
        }
    }

    if has_word(&q, "pat") || q.contains("profit after tax") || q.contains("net profit") {
        if let Some(fact) = &facts.pat {
            return Some(fact_answer(
                fact,
                format!("Profit after tax was ₹{}{}.", fact.value, period_suffix(facts)),
                doc_url,
            ));
        }
    }

    if has_word(&q, "eps") || q.contains("earnings per share") {
        if let Some(fact) = &facts.eps {
            return Some(fact_answer(
                fact,
                format!("Earnings per share were ₹{}{}.", fact.value, period_suffix(facts)),
                doc_url,
            ));
        }
    }

    None
}
