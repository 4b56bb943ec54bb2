//! Signup, login, token rotation and password reset over HTTP.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_user, get, get_auth, post_json, post_json_auth, TEST_PASSWORD};
use querypilot_core::otp::OtpPurpose;
use querypilot_db::repositories::{OtpRepo, UserRepo};
use serde_json::json;
use sqlx::PgPool;

async fn login(app: &axum::Router, identifier: &str, password: &str) -> axum::response::Response {
    post_json(
        app,
        "/api/auth/login",
        json!({ "identifier": identifier, "password": password }),
    )
    .await
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_with_emailed_code_then_login(pool: PgPool) {
    let test = common::build_test_app(pool.clone());

    let response = post_json(
        &test.app,
        "/api/auth/send-otp",
        json!({ "email": "Ada@Example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let otp = OtpRepo::find(&pool, OtpPurpose::Signup, "ada@example.com")
        .await
        .unwrap()
        .expect("code stored under the normalized address");

    let response = post_json(
        &test.app,
        "/api/auth/signup",
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "analytical-engine",
            "otp": otp.code,
            "gender": "Female",
            "username": "ada",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let user = UserRepo::find_by_email(&pool, "ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.gender, "female");
    assert_ne!(user.password_hash, "analytical-engine");

    // Login by username and by email both work.
    for identifier in ["ada", "ada@example.com"] {
        let response = login(&test.app, identifier, "analytical-engine").await;
        assert_eq!(response.status(), StatusCode::OK, "identifier {identifier}");
        let json = body_json(response).await;
        assert!(json["access_token"].is_string());
        assert!(json["refresh_token"].is_string());
        assert_eq!(json["user"]["username"], "ada");
        assert!(json["user"].get("password_hash").is_none());
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signup_rejects_a_wrong_code(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    post_json(&test.app, "/api/auth/send-otp", json!({ "email": "bob@example.com" })).await;

    let response = post_json(
        &test.app,
        "/api/auth/signup",
        json!({
            "first_name": "Bob",
            "last_name": "Builder",
            "email": "bob@example.com",
            "password": "can-we-fix-it",
            "otp": "not-a-code",
            "gender": "male",
            "username": "bob",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(UserRepo::find_by_email(&pool, "bob@example.com")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_send_otp_rejects_registered_email(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "carol").await;

    let response = post_json(
        &test.app,
        "/api/auth/send-otp",
        json!({ "email": "carol@example.com" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_wrong_password_and_unknown_user_look_the_same(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "dave").await;

    let wrong = login(&test.app, "dave", "nope-nope-nope").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;

    let unknown = login(&test.app, "nobody", "nope-nope-nope").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;

    assert_eq!(wrong["error"], unknown["error"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_rotates_the_token(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "erin").await;

    let json = body_json(login(&test.app, "erin", TEST_PASSWORD).await).await;
    let first = json["refresh_token"].as_str().unwrap().to_string();

    let response = post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": first })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let second = json["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(json["user"]["username"], "erin");

    let response = post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": second })).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replayed_refresh_token_ends_every_session(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    let user = create_user(&pool, "erin").await;

    let json = body_json(login(&test.app, "erin", TEST_PASSWORD).await).await;
    let first = json["refresh_token"].as_str().unwrap().to_string();
    let json = body_json(
        post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": first })).await,
    )
    .await;
    let second = json["refresh_token"].as_str().unwrap().to_string();

    // A second device stays logged in until the replay.
    let other = body_json(login(&test.app, "erin", TEST_PASSWORD).await).await;
    let other = other["refresh_token"].as_str().unwrap().to_string();
    test.attach_closable_target(user.id, &pool).await;

    let replay = post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": first })).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    for token in [second, other] {
        let response =
            post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": token })).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(test.state.connections.get(user.id).is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_logout_revokes_refresh_tokens(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "frank").await;

    let json = body_json(login(&test.app, "frank", TEST_PASSWORD).await).await;
    let access = json["access_token"].as_str().unwrap().to_string();
    let refresh = json["refresh_token"].as_str().unwrap().to_string();

    let response = post_json_auth(&test.app, "/api/auth/logout", json!({}), &access).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(&test.app, "/api/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_account_routes_require_a_token(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    let user = create_user(&pool, "grace").await;

    let response = get(&test.app, "/api/account/me").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(&test.app, "/api/account/me", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = test.token_for(&user);
    let response = get_auth(&test.app, "/api/account/me", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["username"], "grace");
    assert_eq!(json["data"]["email"], "grace@example.com");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_forgot_password_does_not_reveal_accounts(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "heidi").await;

    let known = post_json(
        &test.app,
        "/api/auth/forgot-password",
        json!({ "email": "heidi@example.com" }),
    )
    .await;
    let unknown = post_json(
        &test.app,
        "/api/auth/forgot-password",
        json!({ "email": "ghost@example.com" }),
    )
    .await;

    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_json(known).await, body_json(unknown).await);

    assert!(OtpRepo::find(&pool, OtpPurpose::PasswordReset, "heidi@example.com")
        .await
        .unwrap()
        .is_some());
    assert!(OtpRepo::find(&pool, OtpPurpose::PasswordReset, "ghost@example.com")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reset_password_with_code(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "ivan").await;

    post_json(
        &test.app,
        "/api/auth/forgot-password",
        json!({ "email": "ivan@example.com" }),
    )
    .await;
    let otp = OtpRepo::find(&pool, OtpPurpose::PasswordReset, "ivan@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = post_json(
        &test.app,
        "/api/auth/verify-reset-otp",
        json!({ "email": "ivan@example.com", "otp": otp.code }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &test.app,
        "/api/auth/reset-password",
        json!({
            "email": "ivan@example.com",
            "otp": otp.code,
            "new_password": "brand-new-secret",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        login(&test.app, "ivan", TEST_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&test.app, "ivan", "brand-new-secret").await.status(),
        StatusCode::OK
    );

    // The code is single use.
    assert!(OtpRepo::find(&pool, OtpPurpose::PasswordReset, "ivan@example.com")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resend_reset_code_waits_for_the_cooldown(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "judy").await;

    post_json(
        &test.app,
        "/api/auth/forgot-password",
        json!({ "email": "judy@example.com" }),
    )
    .await;
    let response = post_json(
        &test.app,
        "/api/auth/resend-reset-otp",
        json!({ "email": "judy@example.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_login_is_rate_limited(pool: PgPool) {
    let test = common::build_test_app(pool.clone());
    create_user(&pool, "mallory").await;

    for _ in 0..10 {
        let response = login(&test.app, "mallory", "guessing-1234").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = login(&test.app, "mallory", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["code"], "RATE_LIMITED");
}
