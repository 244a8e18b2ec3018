use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::token::InvalidReason;

/// A `kid` missing from a fresh set forces at most one refetch per this interval.
const FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// After a failed fetch, refreshes fail fast for this long instead of refetching.
const FAILURE_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("key set request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("key set source returned no keys")]
    Empty,
    #[error("key set fetch failed recently; retry in {0:?}")]
    Backoff(Duration),
}

/// Source of the published verification keys for one trust domain.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError>;
}

/// Fetches the key set from the trust domain's discovery endpoint.
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpKeyFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if set.keys.is_empty() {
            return Err(KeyFetchError::Empty);
        }
        Ok(set)
    }
}

#[derive(Clone)]
struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Process-wide, TTL-bounded cache of one trust domain's key set.
///
/// Readers share the current set; a refresh replaces it wholesale. Refreshes are
/// single-flight: concurrent readers that find the set stale wait on one fetch.
/// A failed fetch leaves the previous state (stale or absent) in place, and callers
/// queued behind it fail fast for a short backoff instead of refetching.
pub struct JwksCache {
    fetcher: Arc<dyn KeyFetcher>,
    ttl: Duration,
    current: RwLock<Option<CachedKeys>>,
    /// Held for the duration of a fetch; records when the last fetch failed.
    refresh: Mutex<Option<Instant>>,
}

impl JwksCache {
    pub fn new(fetcher: Arc<dyn KeyFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            current: RwLock::new(None),
            refresh: Mutex::new(None),
        }
    }

    /// The cached set if younger than the TTL, otherwise a freshly fetched one.
    pub async fn get_or_refresh(&self) -> Result<Arc<JwkSet>, KeyFetchError> {
        if let Some(keys) = self.fresh().await {
            return Ok(keys);
        }
        let mut last_failure = self.refresh.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(keys) = self.fresh().await {
            return Ok(keys);
        }
        self.refresh_locked(&mut last_failure).await
    }

    /// Looks up the verification key for `kid`, refetching once if it is unknown.
    pub async fn signing_key(&self, kid: &str) -> Result<Jwk, InvalidReason> {
        let keys = self.get_or_refresh().await.map_err(|_| InvalidReason::KeysUnavailable)?;
        if let Some(jwk) = keys.find(kid) {
            return Ok(jwk.clone());
        }

        let mut last_failure = self.refresh.lock().await;
        let cached = self.current.read().await.clone();
        if let Some(jwk) = cached.as_ref().and_then(|c| c.keys.find(kid)) {
            return Ok(jwk.clone());
        }
        let may_force = cached
            .map(|c| c.fetched_at.elapsed() >= FORCED_REFRESH_INTERVAL)
            .unwrap_or(true);
        if !may_force {
            debug!(kid, "unknown key id; forced refresh suppressed");
            return Err(InvalidReason::UnknownKey);
        }
        let keys = self
            .refresh_locked(&mut last_failure)
            .await
            .map_err(|_| InvalidReason::KeysUnavailable)?;
        keys.find(kid).cloned().ok_or(InvalidReason::UnknownKey)
    }

    async fn fresh(&self) -> Option<Arc<JwkSet>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.keys))
    }

    // `last_failure` is the guarded contents of `self.refresh`.
    async fn refresh_locked(
        &self,
        last_failure: &mut Option<Instant>,
    ) -> Result<Arc<JwkSet>, KeyFetchError> {
        if let Some(failed_at) = *last_failure {
            let since = failed_at.elapsed();
            if since < FAILURE_BACKOFF {
                debug!("signing key refresh suppressed after recent failure");
                return Err(KeyFetchError::Backoff(FAILURE_BACKOFF - since));
            }
        }
        match self.fetcher.fetch().await {
            Ok(set) => {
                *last_failure = None;
                let keys = Arc::new(set);
                *self.current.write().await = Some(CachedKeys {
                    keys: Arc::clone(&keys),
                    fetched_at: Instant::now(),
                });
                info!(keys = keys.keys.len(), "signing key set refreshed");
                Ok(keys)
            }
            Err(e) => {
                let stale = self.current.read().await.is_some();
                warn!(error = %e, stale_present = stale, "signing key refresh failed");
                *last_failure = Some(Instant::now());
                Err(e)
            }
        }
    }
}
