use axum::routing::{get, post};
use axum::Router;

use crate::handlers::connection;
use crate::state::AppState;

/// Connection routes, mounted directly under `/api`. All require auth.
///
/// ```text
/// POST /databases/list    -> list_databases
/// POST /databases/create  -> create_database
/// POST /connect           -> connect
/// POST /disconnect        -> disconnect
/// GET  /connection        -> current
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/databases/list", post(connection::list_databases))
        .route("/databases/create", post(connection::create_database))
        .route("/connect", post(connection::connect))
        .route("/disconnect", post(connection::disconnect))
        .route("/connection", get(connection::current))
}
