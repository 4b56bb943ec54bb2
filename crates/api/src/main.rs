use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use querypilot_core::confirmation::ConfirmationGate;
use querypilot_llm::{ChatCompletionsGenerator, LlmConfig};
use querypilot_target::ConnectionRegistry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use querypilot_api::background::sweeper;
use querypilot_api::config::ServerConfig;
use querypilot_api::notifications::mailer::mailer_from_env;
use querypilot_api::rate_limit::RateLimiter;
use querypilot_api::router::build_app_router;
use querypilot_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querypilot_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let llm_config = LlmConfig::from_env().expect("LLM configuration is incomplete");
    tracing::info!(model = %llm_config.model, "SQL generator configured");
    let generator =
        ChatCompletionsGenerator::new(llm_config).expect("Failed to build the LLM HTTP client");

    // --- Application store ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = querypilot_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    querypilot_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    querypilot_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- App state ---
    let connections = ConnectionRegistry::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        connections: connections.clone(),
        gate: ConfirmationGate::new(config.pending_ttl()),
        generator: Arc::new(generator),
        mailer: mailer_from_env(),
        rate_limiter: Arc::new(RateLimiter::new()),
    };

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(sweeper::run(state.clone(), cancel.clone()));

    // --- Start server ---
    let app = build_app_router(state, &config);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, sweeper_handle).await.is_err() {
        tracing::warn!("Sweeper did not stop in time");
    }

    let open = connections.drain();
    tracing::info!(count = open.len(), "Closing target connections");
    for connection in open {
        connection.pool.close().await;
    }

    tracing::info!("Graceful shutdown complete");
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
