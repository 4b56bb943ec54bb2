//! Chat session entity and DTOs.

use querypilot_core::chat::ChatMessage;
use querypilot_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `chat_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatSession {
    pub id: DbId,
    #[serde(skip)]
    pub user_id: DbId,
    pub title: String,
    pub messages: Json<Vec<ChatMessage>>,
    pub is_starred: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Listing entry without the transcript body.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatSessionSummary {
    pub id: DbId,
    pub title: String,
    pub is_starred: bool,
    pub message_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatSession {
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

/// Partial update. `None` fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateChatSession {
    pub title: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
}
