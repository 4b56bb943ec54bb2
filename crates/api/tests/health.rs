//! Health endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use sqlx::PgPool;
use tower::ServiceExt;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_reports_store_and_counters(pool: PgPool) {
    let test = common::build_test_app(pool);
    let response = get(&test.app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert!(json["version"].is_string());
    assert_eq!(json["active_connections"], 0);
    assert_eq!(json["pending_statements"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_is_also_served_under_api(pool: PgPool) {
    let test = common::build_test_app(pool);
    let response = get(&test.app, "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_route_returns_404(pool: PgPool) {
    let test = common::build_test_app(pool);
    let response = get(&test.app, "/api/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_responses_carry_a_request_id(pool: PgPool) {
    let test = common::build_test_app(pool);
    let response = get(&test.app, "/health").await;

    let id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert_eq!(id.len(), 36);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cors_preflight_allows_the_frontend(pool: PgPool) {
    let test = common::build_test_app(pool);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type,authorization")
        .body(Body::empty())
        .unwrap();

    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    let methods = response.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"), "got {methods}");
}
