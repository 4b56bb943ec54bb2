//! One-time verification codes for signup, password reset and email change.

use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

pub const OTP_LENGTH: usize = 6;

/// Minimum gap between two reset codes sent to the same address.
pub const RESEND_COOLDOWN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    PasswordReset,
    EmailChange,
}

impl OtpPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::PasswordReset => "password_reset",
            Self::EmailChange => "email_change",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            Self::Signup | Self::EmailChange => Duration::minutes(5),
            Self::PasswordReset => Duration::minutes(10),
        }
    }

    /// Subject line of the email carrying the code.
    pub fn email_subject(self) -> &'static str {
        match self {
            Self::Signup => "Your QueryPilot verification code",
            Self::PasswordReset => "Your QueryPilot password reset code",
            Self::EmailChange => "Confirm your new QueryPilot email",
        }
    }
}

/// Outcome of comparing a submitted code with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Expired,
    Mismatch,
}

/// Generate a zero-padded numeric code.
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Expired codes fail before the value is compared.
pub fn check_otp(stored: &str, expires_at: Timestamp, submitted: &str, now: Timestamp) -> OtpCheck {
    if now >= expires_at {
        return OtpCheck::Expired;
    }
    if constant_time_eq(stored.as_bytes(), submitted.trim().as_bytes()) {
        OtpCheck::Valid
    } else {
        OtpCheck::Mismatch
    }
}

/// Seconds left before another code may be sent, if still cooling down.
pub fn resend_wait(last_sent: Timestamp, now: Timestamp) -> Option<u64> {
    let elapsed = (now - last_sent).num_seconds();
    (elapsed < RESEND_COOLDOWN_SECS).then(|| (RESEND_COOLDOWN_SECS - elapsed.max(0)) as u64)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn check_distinguishes_expired_and_mismatch() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        assert_eq!(check_otp("123456", later, "123456", now), OtpCheck::Valid);
        assert_eq!(check_otp("123456", later, " 123456 ", now), OtpCheck::Valid);
        assert_eq!(check_otp("123456", later, "654321", now), OtpCheck::Mismatch);
        assert_eq!(check_otp("123456", now, "123456", later), OtpCheck::Expired);
    }

    #[test]
    fn purpose_ttls() {
        assert_eq!(OtpPurpose::Signup.ttl(), Duration::minutes(5));
        assert_eq!(OtpPurpose::PasswordReset.ttl(), Duration::minutes(10));
        assert_eq!(OtpPurpose::EmailChange.as_str(), "email_change");
    }

    #[test]
    fn resend_cooldown() {
        let now = Utc::now();
        assert_eq!(resend_wait(now - Duration::seconds(20), now), Some(40));
        assert_eq!(resend_wait(now - Duration::seconds(60), now), None);
    }
}
