use axum::routing::get;
use axum::Router;

use crate::handlers::health;
use crate::state::AppState;

/// Mounted both at the root and under `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}
