//! Question → SQL → gate → target database.
//!
//! SAFE statements run immediately. DESTRUCTIVE statements are parked in the
//! [`ConfirmationGate`](querypilot_core::confirmation::ConfirmationGate) and
//! only run from [`resolve_confirmation`] with the matching ticket.

use querypilot_core::chat::{HistoryTurn, HISTORY_WINDOW};
use querypilot_core::confirmation::{GateScope, Resolution, Submission};
use querypilot_core::error::CoreError;
use querypilot_core::output::{ChatReply, QueryOutput};
use querypilot_core::sql_text::clean_generated_sql;
use querypilot_core::types::DbId;
use querypilot_llm::SqlRequest;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const CANCELLED_MESSAGE: &str = "SQL execution cancelled by user";

const EMPTY_SQL_MESSAGE: &str =
    "Could not produce a SQL statement for that question. Try rephrasing it.";

/// Reply to `POST /api/confirm-sql`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ConfirmOutcome {
    Executed(ChatReply),
    Cancelled(Cancellation),
}

#[derive(Debug, Serialize)]
pub struct Cancellation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: &'static str,
    pub sql: String,
}

/// Answer one question for `scope`.
///
/// Fails with `PENDING_CONFIRMATION` while the scope has an unresolved
/// statement and with `NOT_CONNECTED` when the user has no connection.
/// Execution failures come back as [`ChatReply::Error`], not as `Err`.
pub async fn answer_question(
    state: &AppState,
    scope: GateScope,
    question: &str,
    history: Vec<HistoryTurn>,
) -> AppResult<ChatReply> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CoreError::Validation("Question must not be empty".into()).into());
    }

    state.gate.ensure_idle(&scope)?;
    let connection = state
        .connections
        .get(scope.user_id)
        .ok_or(AppError::NotConnected)?;

    let schema = connection.schema_description().await?;
    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    let request = SqlRequest {
        question: question.to_string(),
        history: history.into_iter().skip(skip).collect(),
        schema,
        engine: connection.profile.engine,
    };

    let raw = state.generator.generate_sql(&request).await?;
    let sql = clean_generated_sql(&raw);
    if sql.is_empty() {
        tracing::warn!(user_id = scope.user_id, generator = state.generator.name(), "Generator returned no statement");
        return Ok(ChatReply::Error {
            sql: None,
            message: EMPTY_SQL_MESSAGE.to_string(),
        });
    }

    match state.gate.submit(scope, connection.id, &sql)? {
        Submission::Execute { sql } => {
            let output = connection.pool.execute(&sql).await;
            // DDL that is not gated (CREATE, RENAME, ...) can still change the schema.
            if matches!(output, QueryOutput::Status { .. }) {
                connection.schema.invalidate();
            }
            tracing::info!(
                user_id = scope.user_id,
                failed = output.is_error(),
                "Statement executed"
            );
            Ok(ChatReply::from_output(sql, output))
        }
        Submission::AwaitConfirmation(confirmation) => {
            tracing::info!(
                user_id = scope.user_id,
                ticket = %confirmation.ticket,
                "Destructive statement awaiting confirmation"
            );
            Ok(ChatReply::ConfirmationRequired(confirmation))
        }
    }
}

/// Apply the user's decision for `ticket`.
///
/// The statement runs at most once: the gate hands out a single permit and
/// removes the entry when the permit is dropped, whatever the outcome.
pub async fn resolve_confirmation(
    state: &AppState,
    user_id: DbId,
    ticket: Uuid,
    confirm: bool,
    echoed_sql: Option<&str>,
) -> AppResult<ConfirmOutcome> {
    let connection = state.connections.get(user_id);
    let resolution = state.gate.resolve(
        user_id,
        ticket,
        confirm.into(),
        connection.as_ref().map(|c| c.id),
        echoed_sql,
    )?;

    match resolution {
        Resolution::Cancelled(pending) => {
            tracing::info!(user_id, ticket = %ticket, "Pending statement cancelled");
            Ok(ConfirmOutcome::Cancelled(Cancellation {
                kind: "status",
                message: CANCELLED_MESSAGE,
                sql: pending.sql,
            }))
        }
        Resolution::Execute(permit) => {
            let connection = connection.ok_or(AppError::NotConnected)?;
            let output = connection.pool.execute(permit.sql()).await;
            if !output.is_error() {
                connection.schema.invalidate();
            }
            tracing::info!(
                user_id,
                ticket = %ticket,
                failed = output.is_error(),
                "Confirmed statement executed"
            );
            let sql = permit.sql().to_string();
            drop(permit);
            Ok(ConfirmOutcome::Executed(ChatReply::from_output(sql, output)))
        }
    }
}
