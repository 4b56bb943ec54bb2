//! Handlers for `/api/account`: the signed-in user's own profile,
//! password and email address.

use axum::extract::State;
use axum::Json;
use querypilot_core::error::CoreError;
use querypilot_core::otp::OtpPurpose;
use querypilot_db::models::user::{UpdateProfile, UserResponse};
use querypilot_db::repositories::{OtpRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{check_password_policy, hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::{check_username, issue_otp, normalize_email, normalize_gender, verify_otp};
use crate::middleware::auth::AuthUser;
use crate::rate_limit::rules;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[serde(default, alias = "firstName")]
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailOtpRequest {
    #[serde(alias = "newEmail")]
    #[validate(email(message = "Invalid email address"))]
    pub new_email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[serde(alias = "newEmail")]
    #[validate(email(message = "Invalid email address"))]
    pub new_email: String,
    pub otp: String,
}

/// GET /api/account/me
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", auth.user_id))?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// PUT /api/account/profile
///
/// Only the fields present in the body change.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateProfileRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate()?;
    let user_key = auth.user_id.to_string();
    state.rate_limiter.check(rules::PROFILE, &user_key)?;

    let username = match input.username.as_deref().map(str::trim) {
        Some(username) => {
            check_username(username)?;
            if let Some(other) = UserRepo::find_by_username(&state.pool, username).await? {
                if other.id != auth.user_id {
                    return Err(CoreError::Conflict("Username already taken".into()).into());
                }
            }
            Some(username.to_string())
        }
        None => None,
    };

    let phone = input
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if let Some(phone) = phone.as_deref() {
        if UserRepo::phone_taken(&state.pool, phone, Some(auth.user_id)).await? {
            return Err(CoreError::Conflict("Phone number already registered".into()).into());
        }
    }

    let gender = input.gender.as_deref().map(normalize_gender).transpose()?;

    let changes = UpdateProfile {
        first_name: input.first_name.map(|s| s.trim().to_string()),
        last_name: input.last_name.map(|s| s.trim().to_string()),
        phone,
        gender,
        username,
    };
    let user = UserRepo::update_profile(&state.pool, auth.user_id, &changes)
        .await?
        .ok_or_else(|| CoreError::not_found("User", auth.user_id))?;

    tracing::info!(user_id = user.id, "Profile updated");
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

/// POST /api/account/change-password
///
/// Requires the current password; the new one must differ from it.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .rate_limiter
        .check(rules::CHANGE_PASSWORD, &auth.user_id.to_string())?;

    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", auth.user_id))?;

    let verify = |password: &str| {
        verify_password(password, &user.password_hash)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))
    };
    if !verify(&input.current_password)? {
        return Err(CoreError::Validation("Current password is incorrect".into()).into());
    }
    check_password_policy(&input.new_password).map_err(CoreError::Validation)?;
    if verify(&input.new_password)? {
        return Err(CoreError::Validation(
            "New password must be different from current password".into(),
        )
        .into());
    }

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password changed");
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}

/// POST /api/account/email-otp
///
/// Send a code to the new address. The change is applied by
/// [`update_email`] once the code is echoed back.
pub async fn send_email_otp(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<EmailOtpRequest>,
) -> AppResult<Json<MessageResponse>> {
    input.validate()?;
    let user_key = auth.user_id.to_string();
    state.rate_limiter.check(rules::EMAIL_OTP, &user_key)?;

    let new_email = normalize_email(&input.new_email);
    if let Some(owner) = UserRepo::find_by_email(&state.pool, &new_email).await? {
        return Err(if owner.id == auth.user_id {
            CoreError::Validation("This is already your email address".into())
        } else {
            CoreError::Conflict("Email already in use".into())
        }
        .into());
    }

    issue_otp(
        &state,
        OtpPurpose::EmailChange,
        &user_key,
        &new_email,
        Some(&new_email),
    )
    .await?;
    Ok(Json(MessageResponse::ok(format!("OTP sent to {new_email}"))))
}

/// PUT /api/account/email
pub async fn update_email(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateEmailRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    input.validate()?;
    let user_key = auth.user_id.to_string();
    state.rate_limiter.check(rules::UPDATE_EMAIL, &user_key)?;

    let new_email = normalize_email(&input.new_email);
    let stored = verify_otp(&state, OtpPurpose::EmailChange, &user_key, &input.otp).await?;
    if stored.new_email.as_deref() != Some(new_email.as_str()) {
        return Err(CoreError::Validation("Email does not match the verified address".into()).into());
    }

    let user = UserRepo::update_email(&state.pool, auth.user_id, &new_email)
        .await?
        .ok_or_else(|| CoreError::not_found("User", auth.user_id))?;
    OtpRepo::delete(&state.pool, OtpPurpose::EmailChange, &user_key).await?;

    tracing::info!(user_id = user.id, "Email updated");
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}
