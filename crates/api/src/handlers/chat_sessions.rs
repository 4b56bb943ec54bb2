//! Handlers for `/api/chat-sessions`.
//!
//! Every query is scoped by the caller; another user's session answers
//! exactly like a missing one.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use querypilot_core::chat::{
    edit_last_user_message, history_from_messages, normalize_editability, normalize_title,
    ChatMessage, MessageKind,
};
use querypilot_core::confirmation::GateScope;
use querypilot_core::error::CoreError;
use querypilot_core::output::ChatReply;
use querypilot_core::types::DbId;
use querypilot_db::models::chat_session::{
    ChatSession, ChatSessionSummary, CreateChatSession, UpdateChatSession,
};
use querypilot_db::repositories::ChatSessionRepo;
use serde::{Deserialize, Serialize};

use crate::engine::pipeline::answer_question;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::rate_limit::rules;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct StarRequest {
    #[serde(alias = "starred")]
    pub is_starred: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

/// Sidebar listing: starred sessions first, then a page of the rest.
#[derive(Debug, Serialize)]
pub struct SessionList {
    pub starred: Vec<ChatSessionSummary>,
    pub recent: Vec<ChatSessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct EditedSession {
    pub session: ChatSession,
    pub reply: ChatReply,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/chat-sessions?limit=&offset=
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<SessionList>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_READ, &auth.user_id.to_string())?;

    let starred = ChatSessionRepo::list_starred(&state.pool, auth.user_id).await?;
    let recent =
        ChatSessionRepo::list_recent(&state.pool, auth.user_id, params.limit(), params.offset())
            .await?;
    Ok(Json(DataResponse {
        data: SessionList { starred, recent },
    }))
}

/// POST /api/chat-sessions
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ChatSession>>)> {
    state
        .rate_limiter
        .check(rules::SESSIONS_CREATE, &auth.user_id.to_string())?;

    let title = normalize_title(input.title.as_deref())?;
    let mut messages = input.messages;
    normalize_editability(&mut messages);

    let session =
        ChatSessionRepo::create(&state.pool, auth.user_id, &CreateChatSession { title, messages })
            .await?;
    tracing::debug!(user_id = auth.user_id, session_id = session.id, "Chat session created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: session })))
}

/// GET /api/chat-sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_READ, &auth.user_id.to_string())?;

    let session = find_owned(&state, auth.user_id, id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /api/chat-sessions/{id}
///
/// Replace the title and/or the transcript.
pub async fn update_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSessionRequest>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_UPDATE, &auth.user_id.to_string())?;

    let title = match input.title.as_deref() {
        Some(title) => Some(normalize_title(Some(title))?),
        None => None,
    };
    let messages = input.messages.map(|mut messages| {
        normalize_editability(&mut messages);
        messages
    });

    let session = ChatSessionRepo::update(
        &state.pool,
        auth.user_id,
        id,
        &UpdateChatSession { title, messages },
    )
    .await?
    .ok_or_else(|| CoreError::not_found("ChatSession", id))?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /api/chat-sessions/{id}/rename
pub async fn rename_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<RenameRequest>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_UPDATE, &auth.user_id.to_string())?;

    let title = normalize_title(Some(&input.title))?;
    let session = ChatSessionRepo::update(
        &state.pool,
        auth.user_id,
        id,
        &UpdateChatSession {
            title: Some(title),
            messages: None,
        },
    )
    .await?
    .ok_or_else(|| CoreError::not_found("ChatSession", id))?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /api/chat-sessions/{id}/star
pub async fn star_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<StarRequest>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_UPDATE, &auth.user_id.to_string())?;

    let session = ChatSessionRepo::set_starred(&state.pool, auth.user_id, id, input.is_starred)
        .await?
        .ok_or_else(|| CoreError::not_found("ChatSession", id))?;
    Ok(Json(DataResponse { data: session }))
}

/// DELETE /api/chat-sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state
        .rate_limiter
        .check(rules::SESSIONS_DELETE, &auth.user_id.to_string())?;

    if !ChatSessionRepo::delete(&state.pool, auth.user_id, id).await? {
        return Err(CoreError::not_found("ChatSession", id).into());
    }
    tracing::debug!(user_id = auth.user_id, session_id = id, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/chat-sessions/{id}/messages/{message_id}
///
/// Rewrite the most recent user message, drop everything after it and
/// append a freshly generated reply. Nothing is saved if generation fails.
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, message_id)): Path<(DbId, String)>,
    Json(input): Json<EditMessageRequest>,
) -> AppResult<Json<DataResponse<EditedSession>>> {
    state
        .rate_limiter
        .check(rules::SESSIONS_UPDATE, &auth.user_id.to_string())?;

    let session = find_owned(&state, auth.user_id, id).await?;
    let mut messages = session.messages.0;
    let index = edit_last_user_message(&mut messages, &message_id, &input.content)?;

    let history = history_from_messages(&messages[..index]);
    let question = messages[index].content.clone();
    let reply = answer_question(
        &state,
        GateScope::new(auth.user_id, Some(id)),
        &question,
        history,
    )
    .await?;

    let kind = if reply.is_error() {
        MessageKind::Error
    } else {
        MessageKind::Assistant
    };
    messages.push(ChatMessage::new(kind, reply.transcript_text()));
    normalize_editability(&mut messages);

    let session = ChatSessionRepo::replace_messages(&state.pool, auth.user_id, id, &messages)
        .await?
        .ok_or_else(|| CoreError::not_found("ChatSession", id))?;
    Ok(Json(DataResponse {
        data: EditedSession { session, reply },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_owned(state: &AppState, user_id: DbId, id: DbId) -> AppResult<ChatSession> {
    Ok(ChatSessionRepo::find(&state.pool, user_id, id)
        .await?
        .ok_or_else(|| CoreError::not_found("ChatSession", id))?)
}
