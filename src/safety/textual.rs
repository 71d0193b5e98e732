//! Keyword checks over raw statement text.
//!
//! These are pattern matches, not a parse: a keyword inside a string
//! literal, comment, or quoted identifier counts the same as a real one.

use regex::Regex;
use std::sync::LazyLock;

static WRITE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|TRUNCATE|ALTER|CREATE|REPLACE)\b")
        .expect("write keyword pattern is valid")
});

static LEADING_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*select\b").expect("select pattern is valid"));

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+\d+\b").expect("limit pattern is valid"));

static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcount\(|\bgroup\s+by\b|\bsum\(|\bavg\(|\bmax\(|\bmin\(")
        .expect("aggregate pattern is valid")
});

/// Strips surrounding whitespace and at most one trailing `;`.
pub fn trim_statement(candidate: &str) -> &str {
    let trimmed = candidate.trim();
    match trimmed.strip_suffix(';') {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    }
}

/// Returns the first write keyword found as a whole word, if any.
pub fn write_keyword(sql: &str) -> Option<&str> {
    WRITE_KEYWORDS.find(sql).map(|m| m.as_str())
}

/// Returns true if the statement begins with the word SELECT.
pub fn is_select(sql: &str) -> bool {
    LEADING_SELECT.is_match(sql)
}

/// Returns true if the statement has an explicit `LIMIT <n>` clause.
pub fn has_limit(sql: &str) -> bool {
    LIMIT_CLAUSE.is_match(sql)
}

/// Returns true if the statement aggregates (count/sum/avg/min/max or GROUP BY).
pub fn has_aggregate(sql: &str) -> bool {
    AGGREGATE.is_match(sql)
}
