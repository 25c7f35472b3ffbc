//! Cached JSON Web Key Sets for provider ID token verification.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;

use super::gateway::OAuthError;

/// How long a fetched key set is trusted before refetching.
pub const JWKS_TTL: Duration = Duration::from_secs(3600);

struct CachedSet {
    set: JwkSet,
    fetched_at: Instant,
}

/// Per-URL key set cache.
///
/// A `kid` missing from a fresh cached set triggers a refetch, which picks
/// up provider key rotation without waiting for the TTL.
pub struct JwksCache {
    client: reqwest::Client,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSet>>,
}

impl JwksCache {
    pub fn new(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Decoding key for `kid` from the key set at `url`.
    pub async fn decoding_key(&self, url: &str, kid: &str) -> Result<DecodingKey, OAuthError> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(url) {
                if cached.fetched_at.elapsed() < self.ttl {
                    if let Some(jwk) = cached.set.find(kid) {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| OAuthError::InvalidToken(e.to_string()));
                    }
                }
            }
        }

        let set = self.fetch(url).await?;
        let key = set
            .find(kid)
            .ok_or_else(|| OAuthError::InvalidToken(format!("Unknown signing key '{kid}'")))
            .and_then(|jwk| {
                DecodingKey::from_jwk(jwk).map_err(|e| OAuthError::InvalidToken(e.to_string()))
            });

        self.entries.write().await.insert(
            url.to_string(),
            CachedSet {
                set,
                fetched_at: Instant::now(),
            },
        );
        key
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, OAuthError> {
        tracing::debug!(url, "Fetching provider signing keys");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<JwkSet>().await?)
    }
}
