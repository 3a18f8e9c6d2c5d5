//! Per-endpoint credential cache with TTL expiration.

use crate::error::CacheError;
use iris_client::IrisClient;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Default credential lifetime.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(300);

/// Default bound for a single credential fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Access token and device id issued by a gateway.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub device_id: String,
    pub fetched_at: Instant,
}

impl Credential {
    /// Combined `{access_token}-{device_id}` form used by the board and
    /// reaction backends.
    pub fn session_authorization(&self) -> String {
        format!("{}-{}", self.access_token.expose_secret(), self.device_id)
    }

    /// Raw access token for the `Authorization` header of message sends.
    pub fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }

    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < ttl
    }
}

/// Credential cache keyed by gateway endpoint.
///
/// The lock only guards map access. Fetches run outside it, so two
/// concurrent misses on the same endpoint may both fetch; the later write
/// replaces the earlier entry whole.
#[derive(Clone)]
pub struct CredentialCache {
    client: Client,
    entries: Arc<RwLock<HashMap<String, Credential>>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl CredentialCache {
    /// Create a cache that fetches over the given connection pool.
    pub fn new(client: Client, ttl: Duration) -> Self {
        info!("Credential cache initialized (ttl={:?})", ttl);
        Self {
            client,
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the timeout applied to each credential fetch.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Configured credential lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh credential for `endpoint`, fetching from `{endpoint}/aot`
    /// on a miss, after expiry, or when `force_refresh` is set.
    #[instrument(skip(self))]
    pub async fn get_credential(
        &self,
        endpoint: &str,
        force_refresh: bool,
    ) -> Result<Credential, CacheError> {
        if !force_refresh {
            let entries = self.entries.read().await;
            if let Some(credential) = entries
                .get(endpoint)
                .filter(|c| c.is_fresh(self.ttl, Instant::now()))
            {
                debug!("Credential cache hit");
                return Ok(credential.clone());
            }
        }

        self.evict_stale(endpoint).await;

        let aot = IrisClient::with_client(self.client.clone(), endpoint)
            .with_timeout(self.fetch_timeout)
            .aot()
            .await
            .map_err(|e| {
                warn!("Credential fetch failed: {}", e);
                CacheError::AuthUnavailable(e)
            })?;

        let credential = Credential {
            access_token: aot.access_token,
            device_id: aot.device_id,
            fetched_at: Instant::now(),
        };

        self.entries
            .write()
            .await
            .insert(endpoint.to_string(), credential.clone());

        debug!("Cached credential for device {}", credential.device_id);
        Ok(credential)
    }

    /// Drop the cached credential for an endpoint.
    pub async fn invalidate(&self, endpoint: &str) -> bool {
        self.entries.write().await.remove(endpoint).is_some()
    }

    /// Number of unexpired credentials.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|c| c.is_fresh(self.ttl, now))
            .count()
    }

    /// Whether no unexpired credential is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn evict_stale(&self, endpoint: &str) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries
            .get(endpoint)
            .is_some_and(|c| !c.is_fresh(self.ttl, now))
        {
            entries.remove(endpoint);
            debug!("Evicted expired credential");
        }
    }
}
