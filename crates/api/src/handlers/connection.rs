//! Handlers for target-database connections.
//!
//! Credentials arrive with each request and live only in the caller's
//! [`ActiveConnection`](querypilot_target::ActiveConnection).

use axum::extract::State;
use axum::Json;
use querypilot_core::connection::{
    validate_database_name, ConnectionProfile, ConnectionSummary, DbEngine,
};
use querypilot_core::types::Timestamp;
use querypilot_target::TargetPool;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::rate_limit::rules;
use crate::response::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    #[serde(flatten)]
    pub profile: ConnectionProfile,
    pub database_name: String,
}

#[derive(Debug, Serialize)]
pub struct DatabaseListResponse {
    pub success: bool,
    pub db_type: DbEngine,
    pub databases: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateDatabaseResponse {
    pub success: bool,
    pub message: String,
    pub database: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub db_type: DbEngine,
    pub database: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub connected: bool,
    pub connection: Option<ConnectionSummary>,
    pub connected_at: Option<Timestamp>,
}

/// POST /api/databases/list
///
/// Verify server credentials and list its user databases.
pub async fn list_databases(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(profile): Json<ConnectionProfile>,
) -> AppResult<Json<DatabaseListResponse>> {
    state
        .rate_limiter
        .check(rules::LIST_DATABASES, &auth.user_id.to_string())?;

    let pool = TargetPool::connect(&profile).await?;
    let databases = pool.list_databases(&profile).await;
    pool.close().await;

    let databases = databases?;
    tracing::debug!(user_id = auth.user_id, count = databases.len(), "Listed databases");
    Ok(Json(DatabaseListResponse {
        success: true,
        db_type: profile.engine,
        databases,
    }))
}

/// POST /api/databases/create
pub async fn create_database(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateDatabaseRequest>,
) -> AppResult<Json<CreateDatabaseResponse>> {
    state
        .rate_limiter
        .check(rules::CREATE_DATABASE, &auth.user_id.to_string())?;

    let name = input.database_name.trim();
    validate_database_name(name)?;

    let server = ConnectionProfile {
        database: None,
        ..input.profile
    };
    let pool = TargetPool::connect(&server).await?;
    let created = pool.create_database(&server, name).await;
    pool.close().await;
    created?;

    tracing::info!(user_id = auth.user_id, engine = %server.engine, "Database created");
    Ok(Json(CreateDatabaseResponse {
        success: true,
        message: format!("Database '{name}' created successfully"),
        database: name.to_string(),
    }))
}

/// POST /api/connect
///
/// Open a connection and make it the caller's active one. Statements still
/// awaiting confirmation against the previous connection are discarded.
pub async fn connect(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(profile): Json<ConnectionProfile>,
) -> AppResult<Json<ConnectResponse>> {
    state
        .rate_limiter
        .check(rules::CONNECT, &auth.user_id.to_string())?;

    let pool = TargetPool::connect(&profile).await?;

    let discarded = state.gate.discard_for_user(auth.user_id);
    let (active, previous) = state
        .connections
        .attach(auth.user_id, profile.clone(), pool);
    if let Some(previous) = previous {
        previous.pool.close().await;
    }

    if let Err(e) = active.schema_description().await {
        tracing::warn!(user_id = auth.user_id, error = %e, "Could not prime schema cache");
    }

    tracing::info!(
        user_id = auth.user_id,
        engine = %profile.engine,
        discarded,
        "Database connected"
    );
    Ok(Json(ConnectResponse {
        success: true,
        message: "Database connected successfully".to_string(),
        db_type: profile.engine,
        database: profile.database,
    }))
}

/// POST /api/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    state.gate.discard_for_user(auth.user_id);
    match state.connections.remove(auth.user_id) {
        Some(connection) => {
            connection.pool.close().await;
            tracing::info!(user_id = auth.user_id, "Database disconnected");
            Ok(Json(MessageResponse::ok("Database disconnected successfully")))
        }
        None => Ok(Json(MessageResponse {
            success: false,
            message: "No database connection to disconnect".to_string(),
        })),
    }
}

/// GET /api/connection
pub async fn current(State(state): State<AppState>, auth: AuthUser) -> Json<ConnectionStatus> {
    let active = state.connections.get(auth.user_id);
    Json(ConnectionStatus {
        success: true,
        connected: active.is_some(),
        connection: active.as_ref().map(|c| c.profile.summary()),
        connected_at: active.as_ref().map(|c| c.connected_at),
    })
}
