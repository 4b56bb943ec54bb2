//! Risk classification for generated SQL statements.
//!
//! Classification looks only at the statement's leading keyword. It is a
//! shallow heuristic, not a parser: a `DELETE` hidden inside a comment or a
//! subquery is not detected. Callers run [`crate::sql_text::clean_generated_sql`]
//! first so comments in front of the real statement are already gone.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Leading keywords that make a statement destructive.
pub const DESTRUCTIVE_KEYWORDS: &[&str] = &["DROP", "DELETE", "UPDATE", "TRUNCATE", "ALTER"];

/// Leading keywords whose execution yields a result set.
pub const ROW_RETURNING_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "WITH", "DESCRIBE", "DESC", "EXPLAIN", "VALUES", "TABLE",
];

/// Outcome of classifying a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Destructive,
}

/// Return the statement's first keyword, upper-cased.
///
/// Leading whitespace is skipped; the keyword ends at the first character
/// that is not ASCII alphanumeric or `_`. Returns `None` for blank input.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let trimmed = sql.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    if end == 0 {
        return None;
    }
    Some(trimmed[..end].to_ascii_uppercase())
}

/// Classify a statement as [`RiskLevel::Safe`] or [`RiskLevel::Destructive`].
pub fn classify(sql: &str) -> RiskLevel {
    match leading_keyword(sql) {
        Some(kw) if DESTRUCTIVE_KEYWORDS.contains(&kw.as_str()) => RiskLevel::Destructive,
        _ => RiskLevel::Safe,
    }
}

/// Whether executing the statement produces rows rather than a status.
pub fn returns_rows(sql: &str) -> bool {
    leading_keyword(sql).is_some_and(|kw| ROW_RETURNING_KEYWORDS.contains(&kw.as_str()))
}

/// Injection-like fragments worth flagging to the user before confirmation.
static SUSPICIOUS_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("stacked DROP statement", r"(?i);\s*DROP"),
        ("UNION SELECT", r"(?i)UNION\s+SELECT"),
        ("tautology OR 1=1", r"(?i)OR\s+1\s*=\s*1"),
        ("tautology AND 1=1", r"(?i)AND\s+1\s*=\s*1"),
        ("quoted OR injection", r"(?i)'\s*OR\s*'"),
        ("stacked EXEC", r"(?i);\s*EXEC"),
        ("xp_cmdshell", r"(?i)xp_cmdshell"),
    ]
    .into_iter()
    .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (label, re)))
    .collect()
});

/// Advisory warnings for suspicious fragments in `sql`.
///
/// These never change the classification; they are shown alongside the
/// confirmation preview.
pub fn suspicious_patterns(sql: &str) -> Vec<String> {
    SUSPICIOUS_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(sql))
        .map(|(label, _)| format!("Suspicious pattern: {label}"))
        .collect()
}
