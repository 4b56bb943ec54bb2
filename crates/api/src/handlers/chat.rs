//! Handlers for asking questions and answering confirmation prompts.

use axum::extract::State;
use axum::Json;
use querypilot_core::chat::HistoryTurn;
use querypilot_core::confirmation::GateScope;
use querypilot_core::error::CoreError;
use querypilot_core::output::ChatReply;
use querypilot_core::types::DbId;
use querypilot_db::repositories::ChatSessionRepo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::pipeline::{answer_question, resolve_confirmation, ConfirmOutcome};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::rate_limit::rules;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    /// Prior turns as `{role: "human" | "ai", content}`.
    #[serde(default)]
    pub chat_history: Vec<HistoryTurn>,
    /// Chat session the question belongs to. Each session has its own
    /// confirmation slot.
    #[serde(default)]
    pub session_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub ticket: Uuid,
    pub confirm: bool,
    /// Optional echo of the statement; must match the stored one.
    #[serde(default)]
    pub sql: Option<String>,
}

/// POST /api/chat
///
/// Generate SQL for the question and run it, or park it for confirmation
/// when it is destructive.
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    state
        .rate_limiter
        .check(rules::CHAT, &auth.user_id.to_string())?;

    if let Some(session_id) = input.session_id {
        ChatSessionRepo::find(&state.pool, auth.user_id, session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("ChatSession", session_id))?;
    }

    let scope = GateScope::new(auth.user_id, input.session_id);
    let reply = answer_question(&state, scope, &input.question, input.chat_history).await?;
    Ok(Json(ChatResponse {
        success: true,
        response: reply,
    }))
}

/// POST /api/confirm-sql
///
/// `confirm: true` runs the pending statement once; `false` discards it.
pub async fn confirm_sql(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ConfirmRequest>,
) -> AppResult<Json<ConfirmOutcome>> {
    state
        .rate_limiter
        .check(rules::CONFIRM_SQL, &auth.user_id.to_string())?;

    let outcome = resolve_confirmation(
        &state,
        auth.user_id,
        input.ticket,
        input.confirm,
        input.sql.as_deref(),
    )
    .await?;
    Ok(Json(outcome))
}
