//! Tabular-region detection in page text.
//!
//! A line is "tabular" when it carries a pipe delimiter, a run of two or
//! more tabs, or a run of three or more spaces. Two or more consecutive
//! tabular lines form a candidate region; the first row is the header and
//! must yield at least two columns. Dash-only separator rows are discarded.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A detected table: one header row plus zero or more data rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub page: u32,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

static TAB_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t{2,}").expect("tab run"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {3,}").expect("space run"));
static CELL_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\||\t+| {3,}").expect("cell split"));
static SEPARATOR_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-=\s]+$").expect("separator cell"));

fn is_tabular(line: &str) -> bool {
    line.contains('|') || TAB_RUN.is_match(line) || SPACE_RUN.is_match(line)
}

fn split_cells(line: &str) -> Vec<String> {
    CELL_SPLIT
        .split(line)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty() && cells.iter().all(|c| SEPARATOR_CELL.is_match(c))
}

fn flush_region(region: &[&str], page: u32, tables: &mut Vec<Table>) {
    if region.len() < 2 {
        return;
    }

    let mut rows: Vec<Vec<String>> = region
        .iter()
        .map(|line| split_cells(line))
        .filter(|cells| !cells.is_empty() && !is_separator_row(cells))
        .collect();

    if rows.len() < 2 {
        return;
    }

    let headers = rows.remove(0);
    if headers.len() < 2 {
        return;
    }

    tables.push(Table {
        page,
        headers,
        rows,
    });
}

/// Scans one page of text for tabular regions.
pub fn extract_tables(text: &str, page: u32) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut region: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && is_tabular(trimmed) {
            region.push(trimmed);
        } else {
            flush_region(&region, page, &mut tables);
            region.clear();
        }
    }
    // A region running to end-of-page still counts.
    flush_region(&region, page, &mut tables);

    tables
}
