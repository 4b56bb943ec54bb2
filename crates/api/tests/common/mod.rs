#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use querypilot_api::auth::jwt::{generate_access_token, JwtConfig};
use querypilot_api::auth::password::hash_password;
use querypilot_api::config::ServerConfig;
use querypilot_api::notifications::mailer::LogMailer;
use querypilot_api::rate_limit::RateLimiter;
use querypilot_api::router::build_app_router;
use querypilot_api::state::AppState;
use querypilot_core::confirmation::ConfirmationGate;
use querypilot_core::connection::{ConnectionProfile, DbEngine};
use querypilot_db::models::user::{CreateUser, User};
use querypilot_db::repositories::UserRepo;
use querypilot_llm::{LlmError, SqlGenerator, SqlRequest};
use querypilot_target::{ConnectionRegistry, TargetPool};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-42";

/// Answers every question with the question text, so a test chooses the
/// generated SQL by asking it.
pub struct EchoGenerator;

#[async_trait]
impl SqlGenerator for EchoGenerator {
    async fn generate_sql(&self, request: &SqlRequest) -> Result<String, LlmError> {
        Ok(format!("```sql\n{}\n```", request.question))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        pending_ttl_secs: 900,
        jwt: JwtConfig {
            secret: "querypilot-integration-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

/// The production router over `pool`, with the echo generator and the log
/// mailer.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        connections: ConnectionRegistry::new(),
        gate: ConfirmationGate::new(config.pending_ttl()),
        generator: Arc::new(EchoGenerator),
        mailer: Arc::new(LogMailer),
        rate_limiter: Arc::new(RateLimiter::new()),
    };
    TestApp {
        app: build_app_router(state.clone(), &config),
        state,
    }
}

impl TestApp {
    /// Make the test database itself the active target of `user_id`.
    pub fn attach_target(&self, user_id: i64, pool: &PgPool) {
        self.attach(user_id, pool.clone());
    }

    /// Like [`TestApp::attach_target`], but over a separate pool to the same
    /// database. Use it when the code under test closes the connection,
    /// since closing a pool closes every clone of it.
    pub async fn attach_closable_target(&self, user_id: i64, pool: &PgPool) {
        let own = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(pool.connect_options().as_ref().clone())
            .await
            .unwrap();
        self.attach(user_id, own);
    }

    fn attach(&self, user_id: i64, pool: PgPool) {
        let profile = ConnectionProfile {
            engine: DbEngine::Postgresql,
            host: "localhost".into(),
            port: 5432,
            user: "test".into(),
            password: String::new(),
            database: Some("test".into()),
        };
        self.state
            .connections
            .attach(user_id, profile, TargetPool::Postgres(pool));
    }

    pub fn token_for(&self, user: &User) -> String {
        generate_access_token(user.id, &user.username, &self.state.config.jwt).unwrap()
    }
}

pub async fn create_user(pool: &PgPool, username: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            phone: None,
            first_name: "Test".into(),
            last_name: "User".into(),
            gender: "unspecified".into(),
            password_hash: hash_password(TEST_PASSWORD).unwrap(),
        },
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
