//! Route definitions for `/auth`.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /send-otp          -> send_otp
/// POST /signup            -> signup
/// POST /login             -> login
/// POST /refresh           -> refresh
/// POST /logout            -> logout (requires auth)
/// POST /forgot-password   -> forgot_password
/// POST /verify-reset-otp  -> verify_reset_otp
/// POST /reset-password    -> reset_password
/// POST /resend-reset-otp  -> resend_reset_otp
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-reset-otp", post(auth::verify_reset_otp))
        .route("/reset-password", post(auth::reset_password))
        .route("/resend-reset-otp", post(auth::resend_reset_otp))
}
