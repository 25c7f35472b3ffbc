//! Integration tests for the periodic auth cleanup pass.

mod common;

use chrono::{Duration, Utc};
use common::create_user;
use pagespace_api::background::auth_cleanup;
use pagespace_core::platform::Platform;
use pagespace_db::models::exchange_code::CreateExchangeCode;
use pagespace_db::models::refresh_token::CreateRefreshToken;
use pagespace_db::repositories::{ExchangeCodeRepo, RefreshTokenRepo};
use sqlx::PgPool;

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn refresh_row(user_id: i64, hash: &str, expires_in: Duration) -> CreateRefreshToken {
    CreateRefreshToken {
        user_id,
        token_hash: hash.to_string(),
        device_token_id: None,
        platform: Platform::Web,
        user_agent: None,
        ip_address: None,
        expires_at: Utc::now() + expires_in,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cleanup_purges_expired_refresh_tokens_only(pool: PgPool) {
    let user = create_user(&pool, "cleanup@example.com").await;
    RefreshTokenRepo::create(&pool, &refresh_row(user.id, "expired", Duration::hours(-1)))
        .await
        .unwrap();
    RefreshTokenRepo::create(&pool, &refresh_row(user.id, "live", Duration::days(7)))
        .await
        .unwrap();

    auth_cleanup::run_once(&pool).await;

    let remaining: Vec<String> = sqlx::query_scalar("SELECT token_hash FROM refresh_tokens")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, vec!["live".to_string()]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cleanup_purges_consumed_exchange_codes(pool: PgPool) {
    let user = create_user(&pool, "codes@example.com").await;
    for hash in ["used", "pending"] {
        ExchangeCodeRepo::create(
            &pool,
            &CreateExchangeCode {
                code_hash: hash.to_string(),
                user_id: user.id,
                device_id: common::DEVICE_ID.to_string(),
                device_name: None,
                expires_at: Utc::now() + Duration::minutes(5),
            },
        )
        .await
        .unwrap();
    }
    ExchangeCodeRepo::consume(&pool, "used").await.unwrap().unwrap();

    auth_cleanup::run_once(&pool).await;

    assert_eq!(count(&pool, "auth_exchange_codes").await, 1);
    assert!(ExchangeCodeRepo::consume(&pool, "pending").await.unwrap().is_some());
}
