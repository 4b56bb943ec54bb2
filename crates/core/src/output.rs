//! Shapes returned to the client for a single chat turn.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::preview::StatementPreview;

/// Column headers plus stringified rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub data: Vec<Vec<String>>,
}

/// Result of running one statement against a target database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryOutput {
    /// Row-returning statement.
    Select {
        columns: Vec<String>,
        data: Vec<Vec<String>>,
        row_count: usize,
    },
    /// Statement without a result set.
    Status { message: String, affected_rows: u64 },
    /// Driver-level failure while executing.
    Error { message: String },
}

impl QueryOutput {
    pub fn select(columns: Vec<String>, data: Vec<Vec<String>>) -> Self {
        let row_count = data.len();
        Self::Select {
            columns,
            data,
            row_count,
        }
    }

    pub fn status(affected_rows: u64) -> Self {
        Self::Status {
            message: format!(
                "Statement executed successfully. {affected_rows} row(s) affected."
            ),
            affected_rows,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Payload returned instead of a result when a statement needs approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequired {
    /// Ticket the client must echo back to confirm or cancel.
    pub ticket: Uuid,
    pub sql: String,
    /// Preview rendered as a table for clients that only draw grids.
    pub table: TableData,
    pub preview: StatementPreview,
    pub warnings: Vec<String>,
}

/// Everything a chat turn can answer with.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatReply {
    Select {
        sql: String,
        columns: Vec<String>,
        data: Vec<Vec<String>>,
        row_count: usize,
    },
    Status {
        sql: String,
        message: String,
        affected_rows: u64,
    },
    Error {
        sql: Option<String>,
        message: String,
    },
    ConfirmationRequired(ConfirmationRequired),
}

impl ChatReply {
    /// Attach the executed statement to a [`QueryOutput`].
    pub fn from_output(sql: String, output: QueryOutput) -> Self {
        match output {
            QueryOutput::Select {
                columns,
                data,
                row_count,
            } => Self::Select {
                sql,
                columns,
                data,
                row_count,
            },
            QueryOutput::Status {
                message,
                affected_rows,
            } => Self::Status {
                sql,
                message,
                affected_rows,
            },
            QueryOutput::Error { message } => Self::Error {
                sql: Some(sql),
                message,
            },
        }
    }

    /// Text stored in a transcript for this reply.
    pub fn transcript_text(&self) -> String {
        match self {
            Self::Select { sql, row_count, .. } => {
                format!("SQL: `{sql}`\n{row_count} row(s) returned.")
            }
            Self::Status { sql, message, .. } => format!("SQL: `{sql}`\n{message}"),
            Self::Error { message, .. } => message.clone(),
            Self::ConfirmationRequired(c) => format!(
                "SQL: `{}`\nThis statement needs confirmation before it runs.",
                c.sql
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
