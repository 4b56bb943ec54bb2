//! Stored one-time codes.

use querypilot_core::otp::OtpPurpose;
use querypilot_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `otp_codes` table.
#[derive(Debug, Clone, FromRow)]
pub struct OtpCode {
    pub id: DbId,
    pub purpose: String,
    /// Email address for signup and reset, user id for email change.
    pub subject: String,
    pub code: String,
    pub new_email: Option<String>,
    /// Set once a reset code has been checked by `verify-reset-otp`.
    pub verified: bool,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

pub struct IssueOtp<'a> {
    pub purpose: OtpPurpose,
    pub subject: &'a str,
    pub code: &'a str,
    pub new_email: Option<&'a str>,
    pub expires_at: Timestamp,
}
