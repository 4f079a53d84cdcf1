//! JWKS retrieval and caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::AuthError;

/// Source of the identity provider's signing keys.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self, issuer: &str) -> Result<JwkSet, AuthError>;
}

/// Fetches `{issuer}/.well-known/jwks.json` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn jwks_url(issuer: &str) -> String {
        format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, issuer: &str) -> Result<JwkSet, AuthError> {
        let url = Self::jwks_url(issuer);
        tracing::info!(name: "identity.jwks.fetch", url = %url, "Fetching JWKS");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Jwks(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Jwks(format!(
                "{url} returned status {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::Jwks(format!("invalid JWKS from {url}: {e}")))
    }
}

/// Shortest gap between two fetches of the key set. Unknown `kid`s inside
/// this window fail without a network call.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on one JWKS request.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct CachedKeys {
    set: Option<JwkSet>,
    last_attempt: Option<Instant>,
}

impl CachedKeys {
    fn find(&self, kid: &str) -> Option<Jwk> {
        self.set.as_ref().and_then(|set| set.find(kid)).cloned()
    }

    fn refreshed_recently(&self, min_interval: Duration) -> bool {
        self.last_attempt.is_some_and(|at| at.elapsed() < min_interval)
    }
}

/// Cached key set for one issuer.
pub struct JwksCache {
    issuer: String,
    fetcher: Arc<dyn JwksFetcher>,
    keys: RwLock<CachedKeys>,
    /// Serialises fetches; readers never wait on the network.
    refresh: Mutex<()>,
    min_refresh_interval: Duration,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("issuer", &self.issuer)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    pub fn new(issuer: impl Into<String>, fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            issuer: issuer.into(),
            fetcher,
            keys: RwLock::new(CachedKeys::default()),
            refresh: Mutex::new(()),
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    /// Key with the given `kid`. An unknown `kid` refetches once, to pick up
    /// rotated keys, unless a fetch happened within the refresh interval.
    pub async fn key(&self, kid: &str) -> Result<Jwk, AuthError> {
        {
            let cached = self.keys.read().await;
            if let Some(jwk) = cached.find(kid) {
                return Ok(jwk);
            }
            if cached.refreshed_recently(self.min_refresh_interval) {
                return Err(AuthError::UnknownKey(kid.to_string()));
            }
        }

        let _refresh = self.refresh.lock().await;
        // Another task may have refreshed while we waited.
        {
            let cached = self.keys.read().await;
            if let Some(jwk) = cached.find(kid) {
                return Ok(jwk);
            }
            if cached.refreshed_recently(self.min_refresh_interval) {
                return Err(AuthError::UnknownKey(kid.to_string()));
            }
        }

        let fetched = self.fetcher.fetch(&self.issuer).await;

        let mut cached = self.keys.write().await;
        cached.last_attempt = Some(Instant::now());
        let fresh = fetched?;
        tracing::debug!(keys = fresh.keys.len(), "JWKS refreshed");
        let found = fresh.find(kid).cloned();
        cached.set = Some(fresh);
        found.ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }

    pub async fn clear(&self) {
        *self.keys.write().await = CachedKeys::default();
    }
}
