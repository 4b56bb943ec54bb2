//! Text clean-up for SQL produced by the language model.

use std::sync::LazyLock;

use regex::Regex;

static TABLE_REFERENCE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bFROM\s+[`\x22]?(\w+)[`\x22]?",
        r"(?i)\bJOIN\s+[`\x22]?(\w+)[`\x22]?",
        r"(?i)\bINTO\s+[`\x22]?(\w+)[`\x22]?",
        r"(?i)\bUPDATE\s+[`\x22]?(\w+)[`\x22]?",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// One statement of a model reply, comments removed.
#[derive(Debug, PartialEq, Eq)]
struct Statement {
    text: String,
    /// Followed by a `;` in the input.
    terminated: bool,
}

/// Split `sql` at `;` and drop `--` and `/* */` comments.
///
/// Text inside `'...'`, `"..."` and `` `...` `` is copied as is, with a
/// doubled quote character staying inside the literal, so `;`, `--` and
/// `/*` there are neither boundaries nor comments.
fn split_statements(sql: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                while chars.next_if(|&next| next != '\n').is_some() {}
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                current.push(' ');
            }
            ';' => statements.push(Statement {
                text: std::mem::take(&mut current).trim().to_string(),
                terminated: true,
            }),
            _ => current.push(c),
        }
    }

    statements.push(Statement {
        text: current.trim().to_string(),
        terminated: false,
    });
    statements
}

/// Remove `--` line comments and `/* */` block comments outside quoted
/// text, then trim. Statement separators are kept.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::new();
    for statement in split_statements(sql) {
        if !out.is_empty() && !statement.text.is_empty() {
            out.push(' ');
        }
        out.push_str(&statement.text);
        if statement.terminated {
            out.push(';');
        }
    }
    out.trim().to_string()
}

/// Normalise a raw model reply into a single executable statement.
///
/// - strips a surrounding markdown code fence (```` ```sql ```` or ```` ``` ````)
/// - removes comments
/// - keeps only the first statement when several are separated by `;`
///
/// Quoted text is never split or stripped. The returned statement keeps
/// its terminating `;` when it had one.
pub fn clean_generated_sql(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```sql").or_else(|| text.strip_prefix("```")) {
        text = rest;
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    match split_statements(text)
        .into_iter()
        .find(|statement| !statement.text.is_empty())
    {
        Some(Statement {
            text,
            terminated: true,
        }) => format!("{text};"),
        Some(Statement { text, .. }) => text,
        None => String::new(),
    }
}

/// Best-effort name of the first table a statement touches.
///
/// Tries `FROM`, `JOIN`, `INTO` and `UPDATE` references in that order.
pub fn extract_table_name(sql: &str) -> Option<String> {
    TABLE_REFERENCE
        .iter()
        .find_map(|re| re.captures(sql))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(
            clean_generated_sql("```sql\nSELECT * FROM users;\n```"),
            "SELECT * FROM users;"
        );
        assert_eq!(clean_generated_sql("```\nSHOW TABLES\n```"), "SHOW TABLES");
    }

    #[test]
    fn keeps_only_first_statement() {
        assert_eq!(
            clean_generated_sql("SELECT 1; DROP TABLE users;"),
            "SELECT 1;"
        );
    }

    #[test]
    fn removes_comments_before_statement() {
        assert_eq!(
            clean_generated_sql("-- remove the row\nDELETE FROM users WHERE id = 5"),
            "DELETE FROM users WHERE id = 5"
        );
        assert_eq!(
            clean_generated_sql("/* multi\nline */ SELECT 2"),
            "SELECT 2"
        );
    }

    #[test]
    fn semicolons_inside_literals_do_not_split() {
        for sql in [
            "UPDATE notes SET body = 'a;b' WHERE id = 1",
            "SELECT * FROM orders WHERE note = 'x;y'",
            "SELECT \"odd;name\" FROM t",
            "SELECT `a;b` FROM t",
        ] {
            assert_eq!(clean_generated_sql(sql), sql);
        }
    }

    #[test]
    fn comment_markers_inside_literals_are_kept() {
        for sql in [
            "SELECT * FROM orders WHERE code = 'A--B'",
            "SELECT * FROM files WHERE path = '/*tmp*/'",
        ] {
            assert_eq!(clean_generated_sql(sql), sql);
        }
    }

    #[test]
    fn doubled_quotes_stay_inside_the_literal() {
        assert_eq!(
            clean_generated_sql("SELECT 'it''s; fine' AS t; DROP TABLE users"),
            "SELECT 'it''s; fine' AS t;"
        );
    }

    #[test]
    fn trailing_semicolon_and_comment_keep_the_statement() {
        assert_eq!(
            clean_generated_sql("SELECT * FROM orders; -- all of them"),
            "SELECT * FROM orders;"
        );
        assert_eq!(
            clean_generated_sql("SELECT 1 -- one\nFROM dual"),
            "SELECT 1 \nFROM dual"
        );
    }

    #[test]
    fn strip_comments_keeps_separators() {
        assert_eq!(
            strip_comments("SELECT 1; /* x */ SELECT '--'"),
            "SELECT 1; SELECT '--'"
        );
    }

    #[test]
    fn blank_reply_stays_blank() {
        assert_eq!(clean_generated_sql("   "), "");
        assert_eq!(clean_generated_sql(";"), "");
    }

    #[test]
    fn table_name_extraction() {
        assert_eq!(
            extract_table_name("SELECT * FROM `orders` WHERE id = 1").as_deref(),
            Some("orders")
        );
        assert_eq!(
            extract_table_name("insert into logs (a) values (1)").as_deref(),
            Some("logs")
        );
        assert_eq!(
            extract_table_name("UPDATE \"accounts\" SET x = 1").as_deref(),
            Some("accounts")
        );
        assert_eq!(extract_table_name("SHOW TABLES"), None);
    }
}
