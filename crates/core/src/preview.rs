//! Human-readable summaries of destructive statements.
//!
//! A [`StatementPreview`] is what the user sees before confirming a
//! destructive statement: which action, on which table, under which
//! condition, and what the consequence is.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::output::TableData;
use crate::sql_risk::leading_keyword;

/// Placeholder used when a part of the statement could not be determined.
pub const UNKNOWN_PART: &str = "-";

/// Column headers of the tabular preview rendering.
pub const PREVIEW_COLUMNS: [&str; 4] = ["Action", "Table", "Condition", "Impact"];

static WHERE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bWHERE\s+(.+?)\s*;?\s*$").expect("static regex"));
static DELETE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFROM\s+[`\x22]?(\w+)").expect("static regex"));
static UPDATE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*UPDATE\s+[`\x22]?(\w+)").expect("static regex"));
static DDL_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:DROP|ALTER|TRUNCATE)\s+(?:(?:TABLE|DATABASE|SCHEMA|VIEW)\s+)?(?:IF\s+EXISTS\s+)?[`\x22]?(\w+)")
        .expect("static regex")
});
static DROP_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*DROP\s+(\w+)").expect("static regex"));

/// Structured description of a pending destructive statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPreview {
    pub action: String,
    pub table: String,
    pub condition: String,
    pub impact: String,
}

impl StatementPreview {
    /// Render as a one-row table with [`PREVIEW_COLUMNS`] headers.
    pub fn to_table(&self) -> TableData {
        TableData {
            columns: PREVIEW_COLUMNS.iter().map(|c| c.to_string()).collect(),
            data: vec![vec![
                self.action.clone(),
                self.table.clone(),
                self.condition.clone(),
                self.impact.clone(),
            ]],
        }
    }
}

fn capture(re: &Regex, sql: &str) -> Option<String> {
    re.captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Build a preview for `sql`.
///
/// Works for any statement; non-destructive ones get action `UNKNOWN`.
pub fn preview(sql: &str) -> StatementPreview {
    let keyword = leading_keyword(sql).unwrap_or_default();
    let condition = capture(&WHERE_CLAUSE, sql);

    let (action, table, condition, impact) = match keyword.as_str() {
        "DELETE" => {
            let impact = if condition.is_some() {
                "Removes matching record(s) permanently"
            } else {
                "Removes ALL records from the table permanently"
            };
            ("DELETE", capture(&DELETE_TARGET, sql), condition, impact)
        }
        "UPDATE" => {
            let impact = if condition.is_some() {
                "Modifies matching record(s) permanently"
            } else {
                "Modifies ALL records in the table permanently"
            };
            ("UPDATE", capture(&UPDATE_TARGET, sql), condition, impact)
        }
        "DROP" => {
            let object = capture(&DROP_OBJECT, sql).map(|o| o.to_ascii_uppercase());
            let impact = match object.as_deref() {
                Some("DATABASE") | Some("SCHEMA") => {
                    "Deletes the entire database and all of its tables"
                }
                _ => "Deletes the table structure and all of its data",
            };
            ("DROP", capture(&DDL_TARGET, sql), None, impact)
        }
        "TRUNCATE" => (
            "TRUNCATE",
            capture(&DDL_TARGET, sql),
            None,
            "Removes ALL records from the table permanently",
        ),
        "ALTER" => (
            "ALTER",
            capture(&DDL_TARGET, sql),
            None,
            "Changes the table structure; existing data may be lost",
        ),
        _ => (
            "UNKNOWN",
            None,
            condition,
            "Removes/modifies record(s) permanently",
        ),
    };

    StatementPreview {
        action: action.to_string(),
        table: table.unwrap_or_else(|| UNKNOWN_PART.to_string()),
        condition: condition.unwrap_or_else(|| UNKNOWN_PART.to_string()),
        impact: impact.to_string(),
    }
}
