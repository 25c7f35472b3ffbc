//! Repository for the `auth_exchange_codes` table.

use sqlx::PgPool;

use crate::models::exchange_code::{CreateExchangeCode, ExchangeCode};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, code_hash, user_id, device_id, device_name, expires_at, consumed_at, created_at";

/// Stores one-time desktop login codes.
pub struct ExchangeCodeRepo;

impl ExchangeCodeRepo {
    /// Insert a new exchange code, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateExchangeCode,
    ) -> Result<ExchangeCode, sqlx::Error> {
        let query = format!(
            "INSERT INTO auth_exchange_codes (code_hash, user_id, device_id, device_name, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExchangeCode>(&query)
            .bind(&input.code_hash)
            .bind(input.user_id)
            .bind(&input.device_id)
            .bind(&input.device_name)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Mark a live code consumed and return it.
    ///
    /// A single conditional `UPDATE` makes the code usable exactly once even
    /// under concurrent exchanges.
    pub async fn consume(
        pool: &PgPool,
        code_hash: &str,
    ) -> Result<Option<ExchangeCode>, sqlx::Error> {
        let query = format!(
            "UPDATE auth_exchange_codes SET consumed_at = NOW()
             WHERE code_hash = $1 AND consumed_at IS NULL AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExchangeCode>(&query)
            .bind(code_hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete consumed or expired codes.
    pub async fn delete_spent(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM auth_exchange_codes WHERE consumed_at IS NOT NULL OR expires_at < NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
