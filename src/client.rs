// src/client.rs

use crate::config::KeySetConfig;
use crate::error::{AuthError, ConfigError};
use crate::model::{JsonWebKeySet, KeySet, SigningKey};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Resolves a token's `kid` to the public key that must have signed it.
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    /// Returns the key published under `kid`.
    ///
    /// Fails with [`AuthError::UnknownKey`] if no such key is published and
    /// with [`AuthError::KeySetUnavailable`] if the keys cannot be obtained.
    async fn signing_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError>;
}

/// A fixed set of keys, for tests and offline deployments.
#[derive(Debug, Clone)]
pub struct StaticKeySet {
    keys: Arc<KeySet>,
}

impl StaticKeySet {
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        Self {
            keys: Arc::new(KeySet::new(keys, Duration::MAX)),
        }
    }

    /// Parses a JWKS document, keeping the usable RSA signing keys.
    pub fn from_jwks_json(json: &str) -> Result<Self, ConfigError> {
        let jwks: JsonWebKeySet =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidKeyFormat(e.to_string()))?;
        Ok(Self {
            keys: Arc::new(KeySet::from_jwks(jwks, Duration::MAX)),
        })
    }
}

#[async_trait]
impl KeySetProvider for StaticKeySet {
    async fn signing_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        self.keys
            .get(kid)
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }
}

/// Expires each cached snapshot after its own TTL.
struct SnapshotExpiry;

impl Expiry<String, Arc<KeySet>> for SnapshotExpiry {
    fn expire_after_create(&self, _key: &String, value: &Arc<KeySet>, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<KeySet>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl())
    }
}

/// A client for fetching and caching the identity provider's JSON Web Key Set.
///
/// The whole key set is cached as one immutable snapshot; readers always see
/// either the previous or the next snapshot, never a mix. Fetches are
/// serialised so at most one is in flight.
#[derive(Clone)]
pub struct JwksClient {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    jwks_uri: Url,
    refresh_interval: Duration,
    min_refetch_interval: Duration,
    // Cache stores `jwks_uri` -> snapshot.
    snapshots: Cache<String, Arc<KeySet>>,
    refresh_lock: Mutex<()>,
}

impl JwksClient {
    /// Creates a new `JwksClient`. No request is made until the first lookup.
    pub fn new(config: &KeySetConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()?;

        let inner = Arc::new(Inner {
            http_client,
            jwks_uri: config.jwks_uri.clone(),
            refresh_interval: config.refresh_interval,
            min_refetch_interval: config.min_refetch_interval,
            snapshots: Cache::builder()
                .max_capacity(1)
                .expire_after(SnapshotExpiry)
                .build(),
            refresh_lock: Mutex::new(()),
        });

        Ok(Self { inner })
    }

    fn cache_key(&self) -> String {
        self.inner.jwks_uri.to_string()
    }

    /// Returns the cached snapshot, fetching it if the cache is cold.
    ///
    /// Concurrent callers on a cold cache share a single fetch. Failures are
    /// not cached, so the next call tries again.
    pub async fn key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        self.inner
            .snapshots
            .try_get_with(self.cache_key(), async {
                let _guard = self.inner.refresh_lock.lock().await;
                // The background refresh may have filled the cache while we waited.
                if let Some(current) = self.inner.snapshots.get(&self.cache_key()).await {
                    return Ok(current);
                }
                self.fetch_key_set().await.map(Arc::new)
            })
            .await
            .map_err(|e| AuthError::clone(&e))
    }

    /// Fetches a fresh snapshot and swaps it in, unless another task already
    /// replaced the cached one within `min_age`.
    pub async fn refresh(&self, min_age: Duration) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(current) = self.inner.snapshots.get(&self.cache_key()).await {
            if current.age() < min_age {
                debug!("Key set was refreshed concurrently; reusing it.");
                return Ok(current);
            }
        }

        let key_set = Arc::new(self.fetch_key_set().await?);
        self.inner
            .snapshots
            .insert(self.cache_key(), key_set.clone())
            .await;
        Ok(key_set)
    }

    /// Spawns a task that refreshes the key set before it expires.
    ///
    /// Refreshes happen at 80% of the snapshot's TTL; failures back off
    /// exponentially from 5 seconds up to 5 minutes.
    pub fn spawn_background_refresh(&self) -> JoinHandle<()> {
        let refresh_client = self.clone();
        tokio::spawn(async move {
            refresh_client.key_refresh_loop().await;
        })
    }

    /// The main loop for the background key refresh task.
    async fn key_refresh_loop(&self) {
        let base_retry_delay = Duration::from_secs(5);
        let max_retry_delay = Duration::from_secs(300);
        let mut current_retry_delay = base_retry_delay;

        loop {
            let ttl = match self.refresh(Duration::ZERO).await {
                Ok(key_set) => {
                    current_retry_delay = base_retry_delay;
                    key_set.ttl()
                }
                Err(e) => {
                    error!(error = ?e, retry_in = ?current_retry_delay, "Failed to refresh JWKS in background");
                    tokio::time::sleep(current_retry_delay).await;
                    current_retry_delay = (current_retry_delay * 2).min(max_retry_delay);
                    continue;
                }
            };

            let refresh_interval = ttl.mul_f64(0.8).max(Duration::from_secs(1));
            debug!(?refresh_interval, "JWKS background refresh scheduled");
            tokio::time::sleep(refresh_interval).await;
        }
    }

    /// Fetches and parses the JWKS document.
    #[instrument(skip(self), fields(jwks_uri = %self.inner.jwks_uri), err(Debug))]
    async fn fetch_key_set(&self) -> Result<KeySet, AuthError> {
        let response = self
            .inner
            .http_client
            .get(self.inner.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("endpoint answered {status}")));
        }

        let ttl = parse_cache_control(response.headers()).unwrap_or(self.inner.refresh_interval);

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(format!("reading body failed: {e}")))?;
        let jwks: JsonWebKeySet = serde_json::from_slice(&body)
            .map_err(|e| unavailable(format!("malformed key set: {e}")))?;

        let key_set = KeySet::from_jwks(jwks, ttl);
        if key_set.is_empty() {
            warn!("Fetched key set holds no usable signing keys");
        } else {
            info!(keys = key_set.len(), ?ttl, "Fetched signing keys");
        }
        Ok(key_set)
    }
}

#[async_trait]
impl KeySetProvider for JwksClient {
    #[instrument(skip(self))]
    async fn signing_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        let snapshot = self.key_set().await?;
        if let Some(key) = snapshot.get(kid) {
            debug!("JWK cache hit");
            return Ok(key);
        }

        if snapshot.age() < self.inner.min_refetch_interval {
            debug!("JWK cache miss on a fresh key set");
            return Err(AuthError::UnknownKey(kid.to_string()));
        }

        debug!("JWK cache miss on a stale key set; refetching");
        self.refresh(self.inner.min_refetch_interval)
            .await?
            .get(kid)
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }
}

fn unavailable(reason: String) -> AuthError {
    AuthError::KeySetUnavailable(reason)
}

/// Parses the `Cache-Control` header to determine the TTL.
fn parse_cache_control(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|part| {
            part.trim()
                .strip_prefix("max-age=")?
                .parse::<u64>()
                .ok()
                .map(Duration::from_secs)
        })
}
