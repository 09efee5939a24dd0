use crate::domain::payment::AccessToken;
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Key under which the provider's access token is cached.
pub const ACCESS_TOKEN_CACHE_KEY: &str = "mpesa_access_token";

#[derive(Clone)]
struct CachedToken {
    token: AccessToken,
    expires_at: Instant,
}

/// Process-wide cache of short-lived provider credentials.
///
/// Lookups of a live token take only a read lock. On a miss, callers queue on
/// a refresh gate and re-check the cache once inside it, so a burst of
/// concurrent misses performs a single credential exchange.
pub struct TokenCache {
    entries: RwLock<HashMap<String, CachedToken>>,
    refresh_gate: Mutex<()>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            refresh_gate: Mutex::new(()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached token for `key` if it has not expired.
    pub async fn get(&self, key: &str) -> Option<AccessToken> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.token.clone())
    }

    pub async fn insert(&self, key: &str, token: AccessToken) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CachedToken {
                token,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Returns a live token for `key`, running `refresh` at most once across
    /// concurrent callers when the cache is empty or expired.
    ///
    /// A failed refresh yields `None` and leaves the cache empty, so the next
    /// call tries again.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, refresh: F) -> Option<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken>>,
    {
        if let Some(token) = self.get(key).await {
            debug!(key, "Access token served from cache");
            return Some(token);
        }

        let _gate = self.refresh_gate.lock().await;
        // another caller may have refreshed while we waited
        if let Some(token) = self.get(key).await {
            return Some(token);
        }

        match refresh().await {
            Ok(token) => {
                self.insert(key, token.clone()).await;
                info!(key, ttl_secs = self.ttl.as_secs(), "Access token refreshed");
                Some(token)
            }
            Err(e) => {
                warn!(key, error = %e, "Could not obtain access token");
                None
            }
        }
    }
}
