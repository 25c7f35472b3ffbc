//! Repository for the `users` table.

use pagespace_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, name, email, password_hash, google_id, apple_id, provider, \
                        image, email_verified_at, role, token_version, is_active, \
                        failed_login_count, locked_until, last_login_at, tos_accepted_at, \
                        created_at, updated_at";

/// Provides CRUD and login bookkeeping for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users
                (name, email, password_hash, provider, google_id, apple_id, image,
                 email_verified_at, tos_accepted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7,
                 CASE WHEN $8 THEN NOW() END,
                 CASE WHEN $9 THEN NOW() END)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.provider.as_str())
            .bind(&input.google_id)
            .bind(&input.apple_id)
            .bind(&input.image)
            .bind(input.email_verified)
            .bind(input.tos_accepted)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by normalized (lower-case) email.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by Google subject id.
    pub async fn find_by_google_id(
        pool: &PgPool,
        google_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE google_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(google_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by Apple subject id.
    pub async fn find_by_apple_id(
        pool: &PgPool,
        apple_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE apple_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(apple_id)
            .fetch_optional(pool)
            .await
    }

    /// Attach a Google subject id to an existing account and mark its email
    /// verified. Fills in the avatar only when the account has none.
    pub async fn link_google(
        pool: &PgPool,
        id: DbId,
        google_id: &str,
        image: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                google_id = $2,
                image = COALESCE(image, $3),
                email_verified_at = COALESCE(email_verified_at, NOW())
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(google_id)
            .bind(image)
            .fetch_one(pool)
            .await
    }

    /// Attach an Apple subject id to an existing account and mark its email verified.
    pub async fn link_apple(pool: &PgPool, id: DbId, apple_id: &str) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET
                apple_id = $2,
                email_verified_at = COALESCE(email_verified_at, NOW())
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(apple_id)
            .fetch_one(pool)
            .await
    }

    /// Soft-deactivate a user by setting `is_active = false`.
    ///
    /// Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = false WHERE id = $1 AND is_active = true")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment the failed login counter by 1, returning the new count.
    pub async fn increment_failed_login(pool: &PgPool, id: DbId) -> Result<i32, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            "UPDATE users SET failed_login_count = failed_login_count + 1
             WHERE id = $1
             RETURNING failed_login_count",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Lock a user account until the specified timestamp.
    ///
    /// The failure counter restarts so a lapsed lock needs a full run of
    /// failures to trigger again.
    pub async fn lock_account(
        pool: &PgPool,
        id: DbId,
        until: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET locked_until = $2, failed_login_count = 0 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a successful login: reset `failed_login_count` to 0, clear `locked_until`,
    /// and set `last_login_at` to now.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Update a user's password hash. Returns `true` if the row was updated.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote or demote a user. Used by seeding and tests.
    pub async fn set_role(pool: &PgPool, id: DbId, role: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
