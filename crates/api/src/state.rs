use std::sync::Arc;

use querypilot_core::confirmation::ConfirmationGate;
use querypilot_llm::SqlGenerator;
use querypilot_target::ConnectionRegistry;

use crate::config::ServerConfig;
use crate::notifications::mailer::Mailer;
use crate::rate_limit::RateLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is a pool handle or behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application store (users, sessions, OTP codes, chat transcripts).
    pub pool: querypilot_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Each user's active target-database connection.
    pub connections: ConnectionRegistry,
    /// Destructive statements awaiting confirmation.
    pub gate: ConfirmationGate,
    pub generator: Arc<dyn SqlGenerator>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}
