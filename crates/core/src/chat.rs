//! Chat transcript rules.
//!
//! Transcripts are ordered message lists. Only the most recent user message
//! is editable; editing it rewrites the tail of the conversation instead of
//! appending to it.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Title given to sessions created without one.
pub const DEFAULT_SESSION_TITLE: &str = "Untitled Chat";

/// Maximum accepted title length, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Number of trailing messages forwarded to the model as history.
pub const HISTORY_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    Error,
}

/// One entry of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    /// Recomputed on every write; client-supplied values are ignored.
    #[serde(default)]
    pub can_edit: bool,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            can_edit: false,
            timestamp: Utc::now(),
        }
    }
}

/// A prior turn forwarded to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// `"human"` or `"ai"`.
    pub role: String,
    pub content: String,
}

/// Set `can_edit` on the most recent user message only.
pub fn normalize_editability(messages: &mut [ChatMessage]) {
    let last_user = messages.iter().rposition(|m| m.kind == MessageKind::User);
    for (idx, message) in messages.iter_mut().enumerate() {
        message.can_edit = Some(idx) == last_user;
    }
}

/// Rewrite the most recent user message and drop everything after it.
///
/// Returns the index of the edited message. The caller appends exactly one
/// reply afterwards, so the transcript ends with length `index + 2`.
pub fn edit_last_user_message(
    messages: &mut Vec<ChatMessage>,
    message_id: &str,
    new_content: &str,
) -> Result<usize, CoreError> {
    let content = new_content.trim();
    if content.is_empty() {
        return Err(CoreError::Validation("Message content must not be empty".into()));
    }

    let index = messages
        .iter()
        .position(|m| m.id == message_id)
        .ok_or_else(|| CoreError::not_found("ChatMessage", message_id))?;

    let last_user = messages.iter().rposition(|m| m.kind == MessageKind::User);
    if Some(index) != last_user {
        return Err(CoreError::Conflict(
            "Only the most recent user message can be edited".into(),
        ));
    }

    messages.truncate(index + 1);
    let edited = &mut messages[index];
    edited.content = content.to_string();
    edited.timestamp = Utc::now();
    normalize_editability(messages);
    Ok(index)
}

/// Convert the tail of a transcript into model history.
///
/// Error messages are skipped; at most [`HISTORY_WINDOW`] turns are kept.
pub fn history_from_messages(messages: &[ChatMessage]) -> Vec<HistoryTurn> {
    let turns: Vec<HistoryTurn> = messages
        .iter()
        .filter(|m| m.kind != MessageKind::Error)
        .map(|m| HistoryTurn {
            role: if m.kind == MessageKind::User { "human" } else { "ai" }.to_string(),
            content: m.content.clone(),
        })
        .collect();
    let skip = turns.len().saturating_sub(HISTORY_WINDOW);
    turns.into_iter().skip(skip).collect()
}

/// Trim and validate a session title, falling back to the default.
pub fn normalize_title(title: Option<&str>) -> Result<String, CoreError> {
    match title.map(str::trim) {
        None => Ok(DEFAULT_SESSION_TITLE.to_string()),
        Some("") => Err(CoreError::Validation("Title must not be empty".into())),
        Some(t) if t.chars().count() > MAX_TITLE_LEN => Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        ))),
        Some(t) => Ok(t.to_string()),
    }
}
