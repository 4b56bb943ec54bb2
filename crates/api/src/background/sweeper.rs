//! Periodic cleanup of expired state.
//!
//! In memory: pending statements past their TTL and reset rate-limit
//! windows. In the store: expired OTP codes and expired refresh tokens.
//! Rotated tokens stay until expiry so a replay is still recognised.

use std::time::Duration;

use querypilot_db::repositories::{OtpRepo, RefreshTokenRepo};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep every minute until `cancel` fires.
pub async fn run(state: AppState, cancel: CancellationToken) {
    tracing::info!(interval_secs = SWEEP_INTERVAL.as_secs(), "Sweeper started");
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sweeper stopping");
                break;
            }
            _ = interval.tick() => sweep(&state).await,
        }
    }
}

/// One pass. Store failures are logged and retried on the next tick.
pub async fn sweep(state: &AppState) {
    let pending = state.gate.purge_expired();
    let windows = state.rate_limiter.purge_stale();

    let otps = OtpRepo::cleanup_expired(&state.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Sweeper: OTP cleanup failed");
            0
        });
    let refresh_tokens = RefreshTokenRepo::cleanup_expired(&state.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Sweeper: refresh token cleanup failed");
            0
        });

    if pending + windows > 0 || otps + refresh_tokens > 0 {
        tracing::info!(pending, windows, otps, refresh_tokens, "Sweeper: purged expired entries");
    } else {
        tracing::debug!("Sweeper: nothing to purge");
    }
}
