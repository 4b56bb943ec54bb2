use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the application store is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Users with an open target connection.
    pub active_connections: usize,
    /// Statements awaiting a decision across all users.
    pub pending_statements: usize,
}

/// GET /health and GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = querypilot_db::health_check(&state.pool).await.is_ok();
    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        active_connections: state.connections.len(),
        pending_statements: state.gate.len(),
    })
}
