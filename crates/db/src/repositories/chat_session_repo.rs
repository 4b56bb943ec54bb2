//! Repository for the `chat_sessions` table.
//!
//! Every query is scoped by `user_id`; a session owned by someone else is
//! indistinguishable from a missing one.

use querypilot_core::chat::ChatMessage;
use querypilot_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::chat_session::{
    ChatSession, ChatSessionSummary, CreateChatSession, UpdateChatSession,
};

const COLUMNS: &str = "id, user_id, title, messages, is_starred, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "id, title, is_starred, \
                                jsonb_array_length(messages)::BIGINT AS message_count, \
                                created_at, updated_at";

pub struct ChatSessionRepo;

impl ChatSessionRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateChatSession,
    ) -> Result<ChatSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_sessions (user_id, title, messages)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(user_id)
            .bind(&input.title)
            .bind(Json(&input.messages))
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Starred sessions, most recently updated first. Not paginated.
    pub async fn list_starred(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ChatSessionSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM chat_sessions
             WHERE user_id = $1 AND is_starred = true
             ORDER BY updated_at DESC, id DESC"
        );
        sqlx::query_as::<_, ChatSessionSummary>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Unstarred sessions, most recently updated first.
    pub async fn list_recent(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatSessionSummary>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM chat_sessions
             WHERE user_id = $1 AND is_starred = false
             ORDER BY updated_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ChatSessionSummary>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Apply a partial update. Returns `None` if the session is not the user's.
    pub async fn update(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        input: &UpdateChatSession,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!(
            "UPDATE chat_sessions SET
                title = COALESCE($3, title),
                messages = COALESCE($4, messages)
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&input.title)
            .bind(input.messages.as_ref().map(Json))
            .fetch_optional(pool)
            .await
    }

    pub async fn replace_messages(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        messages: &[ChatMessage],
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!(
            "UPDATE chat_sessions SET messages = $3
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .bind(Json(messages))
            .fetch_optional(pool)
            .await
    }

    pub async fn set_starred(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
        starred: bool,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!(
            "UPDATE chat_sessions SET is_starred = $3
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .bind(starred)
            .fetch_optional(pool)
            .await
    }

    /// Delete a session. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, user_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
