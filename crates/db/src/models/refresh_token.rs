//! Refresh tokens issued at login and rotated on every refresh.

use querypilot_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Why a refresh token stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    /// Exchanged for a new token.
    Rotated,
    Logout,
    PasswordReset,
    /// A rotated token was presented again; every token of the user is
    /// revoked with this reason.
    ReuseDetected,
}

impl RevokeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Logout => "logout",
            Self::PasswordReset => "password_reset",
            Self::ReuseDetected => "reuse_detected",
        }
    }
}

/// A row from the `refresh_tokens` table. Only the SHA-256 of the token is
/// stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub revoked_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RefreshToken {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// A token about to be stored, either at login or as the replacement in a
/// rotation.
pub struct IssueRefreshToken {
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
}

/// Result of presenting a refresh token.
#[derive(Debug)]
pub enum Rotation {
    /// The presented token was live; it is now spent and this is its
    /// replacement.
    Rotated(RefreshToken),
    /// The presented token had already been rotated.
    Reused { user_id: DbId },
    /// Unknown, expired, or revoked for another reason.
    Invalid,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn token(revoked: bool, expires_in: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: 1,
            user_id: 1,
            token_hash: "h".into(),
            user_agent: None,
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            revoked_reason: revoked.then(|| RevokeReason::Logout.as_str().to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_means_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(token(false, Duration::days(1)).is_active(now));
        assert!(!token(true, Duration::days(1)).is_active(now));
        assert!(!token(false, Duration::seconds(-1)).is_active(now));
    }

    #[test]
    fn reasons_match_the_check_constraint() {
        let reasons: Vec<_> = [
            RevokeReason::Rotated,
            RevokeReason::Logout,
            RevokeReason::PasswordReset,
            RevokeReason::ReuseDetected,
        ]
        .into_iter()
        .map(RevokeReason::as_str)
        .collect();
        assert_eq!(reasons, ["rotated", "logout", "password_reset", "reuse_detected"]);
    }
}
