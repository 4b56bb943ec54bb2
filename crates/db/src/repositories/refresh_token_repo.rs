//! Repository for the `refresh_tokens` table.

use querypilot_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::refresh_token::{IssueRefreshToken, RefreshToken, RevokeReason, Rotation};

const COLUMNS: &str = "id, user_id, token_hash, user_agent, expires_at, \
                       revoked_at, revoked_reason, created_at, updated_at";

pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    pub async fn issue(
        pool: &PgPool,
        user_id: DbId,
        input: &IssueRefreshToken,
    ) -> Result<RefreshToken, sqlx::Error> {
        insert(pool, user_id, input).await
    }

    /// Spend the token with `presented_hash` and store `replacement` in its
    /// place, in one transaction.
    ///
    /// Of two concurrent rotations of the same token, one succeeds and the
    /// other reports [`Rotation::Reused`].
    pub async fn rotate(
        pool: &PgPool,
        presented_hash: &str,
        replacement: &IssueRefreshToken,
    ) -> Result<Rotation, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let spent: Option<(DbId,)> = sqlx::query_as(
            "UPDATE refresh_tokens SET revoked_at = NOW(), revoked_reason = $2
             WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(presented_hash)
        .bind(RevokeReason::Rotated.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((user_id,)) = spent {
            let token = insert(&mut *tx, user_id, replacement).await?;
            tx.commit().await?;
            return Ok(Rotation::Rotated(token));
        }
        tx.rollback().await?;

        let reused: Option<(DbId,)> = sqlx::query_as(
            "SELECT user_id FROM refresh_tokens WHERE token_hash = $1 AND revoked_reason = $2",
        )
        .bind(presented_hash)
        .bind(RevokeReason::Rotated.as_str())
        .fetch_optional(pool)
        .await?;
        Ok(match reused {
            Some((user_id,)) => Rotation::Reused { user_id },
            None => Rotation::Invalid,
        })
    }

    /// Revoke every live token of a user. Returns how many were live.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        reason: RevokeReason,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW(), revoked_reason = $2
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(reason.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete expired tokens. Revoked tokens are kept until expiry for
    /// replay detection.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: DbId,
    input: &IssueRefreshToken,
) -> Result<RefreshToken, sqlx::Error> {
    let query = format!(
        "INSERT INTO refresh_tokens (user_id, token_hash, user_agent, expires_at)
         VALUES ($1, $2, $3, $4)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, RefreshToken>(&query)
        .bind(user_id)
        .bind(&input.token_hash)
        .bind(&input.user_agent)
        .bind(input.expires_at)
        .fetch_one(executor)
        .await
}
