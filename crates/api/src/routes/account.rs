use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::account;
use crate::state::AppState;

/// Routes mounted at `/account`. All require auth.
///
/// ```text
/// GET  /me               -> me
/// PUT  /profile          -> update_profile
/// POST /change-password  -> change_password
/// POST /email-otp        -> send_email_otp
/// PUT  /email            -> update_email
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(account::me))
        .route("/profile", put(account::update_profile))
        .route("/change-password", post(account::change_password))
        .route("/email-otp", post(account::send_email_otp))
        .route("/email", put(account::update_email))
}
