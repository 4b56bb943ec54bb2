//! Handlers for `/api/auth`: signup with an emailed code, login, token
//! rotation and password reset.

use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use querypilot_core::error::CoreError;
use querypilot_core::types::DbId;
use querypilot_core::otp::{check_otp, generate_otp, resend_wait, OtpCheck, OtpPurpose};
use querypilot_db::models::otp::{IssueOtp, OtpCode};
use querypilot_db::models::refresh_token::{IssueRefreshToken, RevokeReason, Rotation};
use querypilot_db::models::user::{CreateUser, User, UserResponse};
use querypilot_db::repositories::{OtpRepo, RefreshTokenRepo, UserRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::{generate_access_token, generate_refresh_token, hash_refresh_token};
use crate::auth::password::{check_password_policy, hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::rate_limit::rules;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Accepted values of `users.gender`.
pub const GENDERS: &[&str] = &["male", "female", "other", "unspecified"];

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset code.";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(alias = "firstName")]
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[serde(alias = "lastName")]
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
    pub otp: String,
    pub gender: String,
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// Returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/send-otp
///
/// Email a signup code (valid 5 minutes). A new request replaces the old code.
pub async fn send_otp(
    State(state): State<AppState>,
    Json(input): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::SEND_OTP, &email)?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(CoreError::Conflict("Email already registered".into()).into());
    }

    let delivered = issue_otp(&state, OtpPurpose::Signup, &email, &email, None).await?;
    Ok(Json(MessageResponse::ok(if delivered {
        "OTP has been sent to your email."
    } else {
        "Email unavailable; check server logs for OTP."
    })))
}

/// POST /api/auth/signup
///
/// Create an account after checking the emailed code. Responds 201.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::SIGNUP, &email)?;

    check_password_policy(&input.password).map_err(CoreError::Validation)?;
    check_username(&input.username)?;
    let gender = normalize_gender(&input.gender)?;
    let phone = input
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    verify_otp(&state, OtpPurpose::Signup, &email, &input.otp).await?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(CoreError::Conflict("Email already registered".into()).into());
    }
    if let Some(phone) = phone.as_deref() {
        if UserRepo::phone_taken(&state.pool, phone, None).await? {
            return Err(CoreError::Conflict("Phone number already registered".into()).into());
        }
    }
    if UserRepo::find_by_username(&state.pool, input.username.trim())
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict("Username already taken".into()).into());
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email: email.clone(),
            username: input.username.trim().to_string(),
            phone,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            gender,
            password_hash,
        },
    )
    .await?;
    OtpRepo::delete(&state.pool, OtpPurpose::Signup, &email).await?;

    tracing::info!(user_id = user.id, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("User created successfully")),
    ))
}

/// POST /api/auth/login
///
/// Authenticate with email or username plus password.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let identifier = input.identifier.trim();
    state
        .rate_limiter
        .check(rules::LOGIN, &identifier.to_lowercase())?;

    let user = UserRepo::find_by_identifier(&state.pool, identifier)
        .await?
        .ok_or_else(invalid_credentials)?;

    let valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !valid {
        tracing::info!(user_id = user.id, "Login rejected");
        return Err(invalid_credentials());
    }

    let response = create_auth_response(&state, &user, user_agent(&headers)).await?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(response))
}

/// POST /api/auth/refresh
///
/// Exchange a refresh token for a new pair. Each token can be spent once;
/// presenting a spent token again ends every session of its owner.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let presented_hash = hash_refresh_token(&input.refresh_token);
    let (refresh_plaintext, replacement) = new_refresh_token(&state, user_agent(&headers));

    let token = match RefreshTokenRepo::rotate(&state.pool, &presented_hash, &replacement).await? {
        Rotation::Rotated(token) => token,
        Rotation::Reused { user_id } => {
            tracing::warn!(user_id, "Spent refresh token presented again, ending all sessions");
            end_sessions(&state, user_id, RevokeReason::ReuseDetected).await?;
            return Err(invalid_refresh_token());
        }
        Rotation::Invalid => return Err(invalid_refresh_token()),
    };

    let user = UserRepo::find_by_id(&state.pool, token.user_id)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("User no longer exists".into()))?;

    let response = auth_response(&state, &user, refresh_plaintext)?;
    Ok(Json(response))
}

/// POST /api/auth/logout
///
/// Revoke every refresh token of the caller and close their database
/// connection. Returns 204.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    end_sessions(&state, auth_user.user_id, RevokeReason::Logout).await?;
    tracing::info!(user_id = auth_user.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/forgot-password
///
/// Email a reset code (valid 10 minutes). The reply is the same whether or
/// not an account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::FORGOT_PASSWORD, &email)?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        issue_otp(&state, OtpPurpose::PasswordReset, &email, &email, None).await?;
    }
    Ok(Json(MessageResponse::ok(RESET_REQUESTED_MESSAGE)))
}

/// POST /api/auth/verify-reset-otp
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(input): Json<VerifyResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::VERIFY_RESET_OTP, &email)?;

    let stored = verify_otp(&state, OtpPurpose::PasswordReset, &email, &input.otp).await?;
    OtpRepo::mark_verified(&state.pool, stored.id).await?;
    Ok(Json(MessageResponse::ok("Reset code verified successfully.")))
}

/// POST /api/auth/reset-password
///
/// Set a new password with a valid reset code. All refresh tokens of the
/// account are revoked and its database connection is closed.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::RESET_PASSWORD, &email)?;
    check_password_policy(&input.new_password).map_err(CoreError::Validation)?;

    verify_otp(&state, OtpPurpose::PasswordReset, &email, &input.otp).await?;
    let user = UserRepo::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| CoreError::not_found("User", &email))?;

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;
    OtpRepo::delete(&state.pool, OtpPurpose::PasswordReset, &email).await?;
    end_sessions(&state, user.id, RevokeReason::PasswordReset).await?;

    tracing::info!(user_id = user.id, "Password reset");
    Ok(Json(MessageResponse::ok(
        "Password has been reset successfully. You can now login with your new password.",
    )))
}

/// POST /api/auth/resend-reset-otp
///
/// Issue a fresh reset code, at most once per minute per address.
pub async fn resend_reset_otp(
    State(state): State<AppState>,
    Json(input): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let email = normalize_email(&input.email);
    state.rate_limiter.check(rules::RESEND_RESET_OTP, &email)?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_none() {
        return Ok(Json(MessageResponse::ok(RESET_REQUESTED_MESSAGE)));
    }

    if let Some(existing) = OtpRepo::find(&state.pool, OtpPurpose::PasswordReset, &email).await? {
        if let Some(wait) = resend_wait(existing.created_at, Utc::now()) {
            return Err(CoreError::RateLimited {
                retry_after_secs: wait,
            }
            .into());
        }
    }

    issue_otp(&state, OtpPurpose::PasswordReset, &email, &email, None).await?;
    Ok(Json(MessageResponse::ok(
        "A new reset code has been sent to your email.",
    )))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Store a fresh code and mail it to `deliver_to`.
///
/// Returns whether the mailer accepted the message. A delivery failure is
/// logged, not returned, so the stored code stays usable.
pub(crate) async fn issue_otp(
    state: &AppState,
    purpose: OtpPurpose,
    subject: &str,
    deliver_to: &str,
    new_email: Option<&str>,
) -> AppResult<bool> {
    let code = generate_otp();
    OtpRepo::issue(
        &state.pool,
        &IssueOtp {
            purpose,
            subject,
            code: &code,
            new_email,
            expires_at: Utc::now() + purpose.ttl(),
        },
    )
    .await?;

    match state.mailer.send_otp(deliver_to, purpose, &code).await {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::error!(error = %e, purpose = purpose.as_str(), "OTP delivery failed");
            Ok(false)
        }
    }
}

/// Check a submitted code. Expired codes are deleted.
pub(crate) async fn verify_otp(
    state: &AppState,
    purpose: OtpPurpose,
    subject: &str,
    submitted: &str,
) -> AppResult<OtpCode> {
    let stored = OtpRepo::find(&state.pool, purpose, subject)
        .await?
        .ok_or_else(|| {
            CoreError::Validation("Code not requested or expired. Please request a new one.".into())
        })?;

    match check_otp(&stored.code, stored.expires_at, submitted, Utc::now()) {
        OtpCheck::Valid => Ok(stored),
        OtpCheck::Expired => {
            OtpRepo::delete(&state.pool, purpose, subject).await?;
            Err(CoreError::Validation("Code has expired. Please request a new one.".into()).into())
        }
        OtpCheck::Mismatch => Err(CoreError::Validation("Invalid code.".into()).into()),
    }
}

/// Issue a refresh token for a fresh login and build the response.
async fn create_auth_response(
    state: &AppState,
    user: &User,
    user_agent: Option<String>,
) -> AppResult<AuthResponse> {
    let (refresh_plaintext, token) = new_refresh_token(state, user_agent);
    RefreshTokenRepo::issue(&state.pool, user.id, &token).await?;
    auth_response(state, user, refresh_plaintext)
}

fn auth_response(state: &AppState, user: &User, refresh_token: String) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, &user.username, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(AuthResponse {
        access_token,
        refresh_token,
        expires_in: state.config.jwt.access_expiry_secs(),
        user: UserResponse::from(user),
    })
}

/// A new refresh token: the plaintext for the client and the row to store.
fn new_refresh_token(state: &AppState, user_agent: Option<String>) -> (String, IssueRefreshToken) {
    let (plaintext, token_hash) = generate_refresh_token();
    let token = IssueRefreshToken {
        token_hash,
        user_agent,
        expires_at: Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days),
    };
    (plaintext, token)
}

/// Revoke every refresh token of a user, drop their parked confirmations and
/// close their database connection.
///
/// Access tokens already handed out stay valid until they expire, but they
/// find no connection and no pending ticket.
async fn end_sessions(state: &AppState, user_id: DbId, reason: RevokeReason) -> AppResult<()> {
    let revoked = RefreshTokenRepo::revoke_all_for_user(&state.pool, user_id, reason).await?;
    state.gate.discard_for_user(user_id);
    if let Some(connection) = state.connections.remove(user_id) {
        connection.pool.close().await;
    }
    tracing::debug!(user_id, revoked, reason = reason.as_str(), "Sessions ended");
    Ok(())
}

fn invalid_refresh_token() -> AppError {
    CoreError::Unauthorized("Invalid or expired refresh token".into()).into()
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn normalize_gender(gender: &str) -> Result<String, CoreError> {
    let gender = gender.trim().to_lowercase();
    if GENDERS.contains(&gender.as_str()) {
        Ok(gender)
    } else {
        Err(CoreError::Validation(format!(
            "Gender must be one of: {}",
            GENDERS.join(", ")
        )))
    }
}

/// Letters, digits, `_`, `.` and `-`; no `@` so it never looks like an email.
pub(crate) fn check_username(username: &str) -> Result<(), CoreError> {
    let username = username.trim();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if username.len() < 3 || username.len() > 50 || !valid_chars {
        return Err(CoreError::Validation(
            "Username must be 3 to 50 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }
    Ok(())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(255).collect())
}

fn invalid_credentials() -> AppError {
    CoreError::Unauthorized("Incorrect email/username or password".into()).into()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn gender_is_normalized() {
        assert_eq!(normalize_gender(" Female ").unwrap(), "female");
        assert_matches!(normalize_gender("robot"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn username_rules() {
        assert!(check_username("ada_lovelace").is_ok());
        assert!(check_username("ab").is_err());
        assert!(check_username("ada@example.com").is_err());
        assert!(check_username("with space").is_err());
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn signup_request_accepts_camel_case_names() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "password123",
            "otp": "123456",
            "gender": "female",
            "username": "ada"
        }))
        .unwrap();
        assert_eq!(req.first_name, "Ada");
        assert!(req.phone.is_none());
        assert!(req.validate().is_ok());
    }
}
