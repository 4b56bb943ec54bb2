pub mod account;
pub mod auth;
pub mod chat;
pub mod connection;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                 liveness, same as the root `/health`
/// /auth/...               signup, login, tokens, password reset
/// /account/...            profile, password, email (requires auth)
/// /databases/list         list databases on a server
/// /databases/create       create a database
/// /connect, /disconnect   the caller's active connection
/// /connection             current connection summary
/// /chat                   ask a question
/// /confirm-sql            confirm or cancel a pending statement
/// /chat-sessions/...      transcript CRUD
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/account", account::router())
        .merge(connection::router())
        .merge(chat::router())
        .merge(health::router())
}
