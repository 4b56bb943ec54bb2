use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{chat, chat_sessions};
use crate::state::AppState;

/// Chat routes, mounted directly under `/api`. All require auth.
///
/// ```text
/// POST   /chat                                      -> chat
/// POST   /confirm-sql                               -> confirm_sql
/// GET    /chat-sessions                             -> list_sessions
/// POST   /chat-sessions                             -> create_session
/// GET    /chat-sessions/{id}                        -> get_session
/// PUT    /chat-sessions/{id}                        -> update_session
/// DELETE /chat-sessions/{id}                        -> delete_session
/// PUT    /chat-sessions/{id}/star                   -> star_session
/// PUT    /chat-sessions/{id}/rename                 -> rename_session
/// PUT    /chat-sessions/{id}/messages/{message_id}  -> edit_message
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/confirm-sql", post(chat::confirm_sql))
        .route(
            "/chat-sessions",
            get(chat_sessions::list_sessions).post(chat_sessions::create_session),
        )
        .route(
            "/chat-sessions/{id}",
            get(chat_sessions::get_session)
                .put(chat_sessions::update_session)
                .delete(chat_sessions::delete_session),
        )
        .route("/chat-sessions/{id}/star", put(chat_sessions::star_session))
        .route("/chat-sessions/{id}/rename", put(chat_sessions::rename_session))
        .route(
            "/chat-sessions/{id}/messages/{message_id}",
            put(chat_sessions::edit_message),
        )
}
