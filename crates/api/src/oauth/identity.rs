//! Resolving a verified provider identity to a local account.

use pagespace_core::platform::AuthProvider;
use pagespace_core::validation::normalize_email;
use pagespace_db::models::user::{CreateUser, User};
use pagespace_db::repositories::UserRepo;
use pagespace_db::DbPool;

use super::gateway::VerifiedIdentity;
use crate::error::{AppError, AppResult};

/// Find or create the account for `identity`.
///
/// Lookup order: provider subject id, then email. An existing email account
/// is only linked when the provider vouches for the address, otherwise a
/// stranger could claim it by registering the same email with the provider.
/// `fallback_name` is used when the token carries no name (Apple sends the
/// name only on first authorization, outside the token).
pub async fn find_or_create_user(
    pool: &DbPool,
    identity: &VerifiedIdentity,
    fallback_name: Option<&str>,
) -> AppResult<User> {
    let existing = match identity.provider {
        AuthProvider::Google => UserRepo::find_by_google_id(pool, &identity.subject).await?,
        AuthProvider::Apple => UserRepo::find_by_apple_id(pool, &identity.subject).await?,
        AuthProvider::Email => {
            return Err(AppError::InternalError(
                "Email is not an identity provider".into(),
            ))
        }
    };
    if let Some(user) = existing {
        return ensure_active(user);
    }

    let email = identity
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::unauthorized("Identity provider did not return an email"))?;

    if !identity.email_verified {
        return Err(AppError::forbidden(
            "Email address is not verified with the identity provider",
        ));
    }

    if let Some(user) = UserRepo::find_by_email(pool, &email).await? {
        let user = ensure_active(user)?;
        let linked = match identity.provider {
            AuthProvider::Google => {
                UserRepo::link_google(pool, user.id, &identity.subject, identity.picture.as_deref())
                    .await?
            }
            _ => UserRepo::link_apple(pool, user.id, &identity.subject).await?,
        };
        tracing::info!(
            user_id = linked.id,
            provider = %identity.provider,
            "Linked identity provider to existing account"
        );
        return Ok(linked);
    }

    let name = identity
        .name
        .clone()
        .or_else(|| fallback_name.map(str::to_string))
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or("User").to_string());

    let input = CreateUser {
        name,
        email,
        password_hash: None,
        provider: identity.provider,
        google_id: (identity.provider == AuthProvider::Google).then(|| identity.subject.clone()),
        apple_id: (identity.provider == AuthProvider::Apple).then(|| identity.subject.clone()),
        image: identity.picture.clone(),
        email_verified: true,
        tos_accepted: true,
    };
    let user = UserRepo::create(pool, &input).await?;
    tracing::info!(user_id = user.id, provider = %identity.provider, "Created account from identity provider");
    Ok(user)
}

fn ensure_active(user: User) -> AppResult<User> {
    if user.is_active {
        Ok(user)
    } else {
        Err(AppError::forbidden("Account is deactivated"))
    }
}
