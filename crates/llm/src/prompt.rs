//! Prompt construction for SQL generation.

use querypilot_core::chat::HistoryTurn;
use querypilot_core::connection::DbEngine;
use serde::{Deserialize, Serialize};

/// Everything the model needs to answer one question.
#[derive(Debug, Clone)]
pub struct SqlRequest {
    pub question: String,
    pub history: Vec<HistoryTurn>,
    /// Output of the schema introspection for the active connection.
    pub schema: String,
    pub engine: DbEngine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

fn query_patterns(engine: DbEngine) -> &'static str {
    match engine {
        DbEngine::Mysql => {
            "- \"show tables\" / \"list tables\" -> SHOW TABLES;
- \"show all data\" / \"all records from X\" -> SELECT * FROM X;
- \"count\" / \"how many\" / \"total\" -> SELECT COUNT(*) AS count FROM table;
- \"number of tables\" -> SELECT COUNT(*) AS table_count FROM information_schema.tables WHERE table_schema = DATABASE();
- \"current database\" / \"which database\" -> SELECT DATABASE() AS current_database;
- \"all databases\" / \"list databases\" -> SHOW DATABASES;"
        }
        DbEngine::Postgresql => {
            "- \"show tables\" / \"list tables\" -> SELECT table_name FROM information_schema.tables WHERE table_schema = 'public';
- \"show all data\" / \"all records from X\" -> SELECT * FROM X;
- \"count\" / \"how many\" / \"total\" -> SELECT COUNT(*) AS count FROM table;
- \"number of tables\" -> SELECT COUNT(*) AS table_count FROM information_schema.tables WHERE table_schema = 'public';
- \"current database\" / \"which database\" -> SELECT current_database();
- \"all databases\" / \"list databases\" -> SELECT datname FROM pg_database WHERE datistemplate = false;"
        }
    }
}

/// System instruction for `engine`, including the schema description.
pub fn system_prompt(engine: DbEngine, schema: &str) -> String {
    let name = engine.display_name();
    format!(
        "You are a {name} expert. Generate ONLY one valid {name} statement, \
         with no explanations, markdown or extra text.\n\n\
         QUERY PATTERNS:\n{patterns}\n\n\
         RULES:\n\
         - Return ONLY SQL, no ```sql blocks or comments\n\
         - Never mix COUNT(*) with non-aggregated columns without GROUP BY\n\
         - Only reference tables and columns present in the schema\n\n\
         Schema:\n{schema}",
        patterns = query_patterns(engine),
    )
}

/// Render prior turns as `Human:` / `AI:` lines.
pub fn format_history(history: &[HistoryTurn]) -> String {
    history
        .iter()
        .map(|turn| {
            let speaker = if turn.role == "human" { "Human" } else { "AI" };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages sent to the chat completions endpoint.
pub fn build_messages(request: &SqlRequest) -> Vec<Message> {
    let history = format_history(&request.history);
    let user = if history.is_empty() {
        format!("Question: {}\n\nSQL:", request.question.trim())
    } else {
        format!(
            "History:\n{history}\n\nQuestion: {}\n\nSQL:",
            request.question.trim()
        )
    };
    vec![
        Message::new("system", system_prompt(request.engine, &request.schema)),
        Message::new("user", user),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(engine: DbEngine, history: Vec<HistoryTurn>) -> SqlRequest {
        SqlRequest {
            question: " how many orders? ".into(),
            history,
            schema: "orders(id bigint, total numeric)".into(),
            engine,
        }
    }

    #[test]
    fn system_prompt_is_engine_specific() {
        let mysql = system_prompt(DbEngine::Mysql, "t(x int)");
        assert!(mysql.starts_with("You are a MySQL expert"));
        assert!(mysql.contains("SHOW DATABASES"));
        assert!(mysql.ends_with("t(x int)"));

        let pg = system_prompt(DbEngine::Postgresql, "t(x int)");
        assert!(pg.contains("PostgreSQL"));
        assert!(pg.contains("current_database()"));
        assert!(!pg.contains("SHOW DATABASES"));
    }

    #[test]
    fn messages_include_history_and_question() {
        let history = vec![
            HistoryTurn {
                role: "human".into(),
                content: "list tables".into(),
            },
            HistoryTurn {
                role: "ai".into(),
                content: "SHOW TABLES;".into(),
            },
        ];
        let messages = build_messages(&request(DbEngine::Mysql, history));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("orders(id bigint, total numeric)"));
        assert_eq!(
            messages[1].content,
            "History:\nHuman: list tables\nAI: SHOW TABLES;\n\nQuestion: how many orders?\n\nSQL:"
        );
    }

    #[test]
    fn empty_history_is_omitted() {
        let messages = build_messages(&request(DbEngine::Postgresql, vec![]));
        assert_eq!(messages[1].content, "Question: how many orders?\n\nSQL:");
    }
}
