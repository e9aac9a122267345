use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::db::DBClient;
use super::DbError;
use crate::models::otpmodel::Otp;

#[async_trait]
pub trait OtpExt {
    /// Retires every unused code for `phone` and stores the new one.
    async fn replace_otp(
        &self,
        phone: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, DbError>;

    /// Marks a matching, unused, unexpired code as used. False when there is none.
    async fn consume_otp(&self, phone: &str, code: &str, now: DateTime<Utc>)
        -> Result<bool, DbError>;

    async fn purge_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

#[async_trait]
impl OtpExt for DBClient {
    async fn replace_otp(
        &self,
        phone: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE otps SET is_used = TRUE WHERE phone = $1 AND is_used = FALSE")
            .bind(phone)
            .execute(&mut *tx)
            .await?;

        let otp = sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO otps (id, phone, code, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone, code, expires_at, is_used, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(phone)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(otp)
    }

    async fn consume_otp(
        &self,
        phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE otps SET is_used = TRUE
            WHERE phone = $1 AND code = $2 AND is_used = FALSE AND expires_at > $3
            "#,
        )
        .bind(phone)
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at <= $1 OR is_used = TRUE")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
