//! Fixed-window request limits per endpoint and caller.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use querypilot_core::error::CoreError;

/// Entries are pruned inline once the map grows past this size.
const INLINE_CLEANUP_THRESHOLD: usize = 1000;

/// A named limit: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    pub name: &'static str,
    pub max_requests: u32,
    pub window: Duration,
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

impl RateRule {
    pub const fn per_minute(name: &'static str, max_requests: u32) -> Self {
        Self { name, max_requests, window: MINUTE }
    }

    pub const fn per_hour(name: &'static str, max_requests: u32) -> Self {
        Self { name, max_requests, window: HOUR }
    }
}

pub mod rules {
    use super::RateRule;

    pub const SEND_OTP: RateRule = RateRule::per_minute("send_otp", 3);
    pub const SIGNUP: RateRule = RateRule::per_hour("signup", 5);
    pub const LOGIN: RateRule = RateRule::per_minute("login", 10);
    pub const FORGOT_PASSWORD: RateRule = RateRule::per_minute("forgot_password", 3);
    pub const VERIFY_RESET_OTP: RateRule = RateRule::per_minute("verify_reset_otp", 5);
    pub const RESET_PASSWORD: RateRule = RateRule::per_minute("reset_password", 5);
    pub const RESEND_RESET_OTP: RateRule = RateRule::per_minute("resend_reset_otp", 3);

    pub const EMAIL_OTP: RateRule = RateRule::per_minute("email_otp", 3);
    pub const UPDATE_EMAIL: RateRule = RateRule::per_minute("update_email", 10);
    pub const PROFILE: RateRule = RateRule::per_minute("profile", 10);
    pub const CHANGE_PASSWORD: RateRule = RateRule::per_minute("change_password", 5);

    pub const LIST_DATABASES: RateRule = RateRule::per_minute("list_databases", 20);
    pub const CREATE_DATABASE: RateRule = RateRule::per_hour("create_database", 10);
    pub const CONNECT: RateRule = RateRule::per_minute("connect", 20);

    pub const CHAT: RateRule = RateRule::per_minute("chat", 30);
    pub const CONFIRM_SQL: RateRule = RateRule::per_minute("confirm_sql", 20);

    pub const SESSIONS_READ: RateRule = RateRule::per_minute("sessions_read", 60);
    pub const SESSIONS_CREATE: RateRule = RateRule::per_minute("sessions_create", 30);
    pub const SESSIONS_UPDATE: RateRule = RateRule::per_minute("sessions_update", 60);
    pub const SESSIONS_DELETE: RateRule = RateRule::per_minute("sessions_delete", 30);
}

/// In-memory counters keyed by `rule:caller`.
///
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
    length: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `caller` against `rule`.
    ///
    /// Returns [`CoreError::RateLimited`] with the seconds until the window
    /// resets once the limit is exhausted.
    pub fn check(&self, rule: RateRule, caller: &str) -> Result<(), CoreError> {
        self.check_at(rule, caller, Instant::now())
    }

    fn check_at(&self, rule: RateRule, caller: &str, now: Instant) -> Result<(), CoreError> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > INLINE_CLEANUP_THRESHOLD {
            windows.retain(|_, w| !w.elapsed(now));
        }

        let key = format!("{}:{}", rule.name, caller);
        match windows.get_mut(&key) {
            Some(window) if !window.elapsed(now) => {
                if window.count >= rule.max_requests {
                    let remaining = window.length.saturating_sub(now - window.started);
                    tracing::warn!(rule = rule.name, "Rate limit exceeded");
                    return Err(CoreError::RateLimited {
                        retry_after_secs: remaining.as_secs().max(1),
                    });
                }
                window.count += 1;
            }
            _ => {
                windows.insert(
                    key,
                    Window {
                        count: 1,
                        started: now,
                        length: rule.window,
                    },
                );
            }
        }
        Ok(())
    }

    /// Drop every window that has already reset. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, w| !w.elapsed(now));
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Window {
    fn elapsed(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const RULE: RateRule = RateRule::per_minute("test", 3);

    #[test]
    fn allows_up_to_the_limit() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at(RULE, "u1", now).is_ok());
        }
        assert_matches!(
            limiter.check_at(RULE, "u1", now + Duration::from_secs(15)),
            Err(CoreError::RateLimited { retry_after_secs: 45 })
        );
    }

    #[test]
    fn callers_and_rules_are_counted_separately() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at(RULE, "u1", now).unwrap();
        }
        assert!(limiter.check_at(RULE, "u2", now).is_ok());
        assert!(limiter
            .check_at(RateRule::per_minute("other", 1), "u1", now)
            .is_ok());
    }

    #[test]
    fn window_resets_after_its_length() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at(RULE, "u1", now).unwrap();
        }
        assert!(limiter.check_at(RULE, "u1", now + MINUTE).is_ok());
    }

    #[test]
    fn purge_keeps_open_windows() {
        let limiter = RateLimiter::new();
        limiter.check(RULE, "u1").unwrap();
        assert_eq!(limiter.purge_stale(), 0);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn hourly_rules() {
        assert_eq!(rules::SIGNUP.window, HOUR);
        assert_eq!(rules::CREATE_DATABASE.max_requests, 10);
    }
}
