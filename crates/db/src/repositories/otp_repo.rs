//! Repository for the `otp_codes` table.

use querypilot_core::otp::OtpPurpose;
use sqlx::PgPool;

use crate::models::otp::{IssueOtp, OtpCode};

const COLUMNS: &str = "id, purpose, subject, code, new_email, verified, expires_at, \
                        created_at, updated_at";

pub struct OtpRepo;

impl OtpRepo {
    /// Store a fresh code, replacing any live code for the same purpose and subject.
    pub async fn issue(pool: &PgPool, input: &IssueOtp<'_>) -> Result<OtpCode, sqlx::Error> {
        let query = format!(
            "INSERT INTO otp_codes (purpose, subject, code, new_email, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_otp_codes_purpose_subject DO UPDATE SET
                code = EXCLUDED.code,
                new_email = EXCLUDED.new_email,
                expires_at = EXCLUDED.expires_at,
                verified = false,
                created_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OtpCode>(&query)
            .bind(input.purpose.as_str())
            .bind(input.subject)
            .bind(input.code)
            .bind(input.new_email)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Fetch the live code for a purpose and subject, expired or not.
    pub async fn find(
        pool: &PgPool,
        purpose: OtpPurpose,
        subject: &str,
    ) -> Result<Option<OtpCode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM otp_codes WHERE purpose = $1 AND subject = $2");
        sqlx::query_as::<_, OtpCode>(&query)
            .bind(purpose.as_str())
            .bind(subject)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_verified(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE otp_codes SET verified = true WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Consume a code. Returns `true` if a row was removed.
    pub async fn delete(
        pool: &PgPool,
        purpose: OtpPurpose,
        subject: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE purpose = $1 AND subject = $2")
            .bind(purpose.as_str())
            .bind(subject)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
