//! Per-room open-chat link id cache.

use crate::error::CacheError;
use async_trait::async_trait;
use iris_client::IrisClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Default link id lifetime.
pub const DEFAULT_LINK_ID_TTL: Duration = Duration::from_secs(600);

/// Resolves a room's link id from the room store.
///
/// `Ok(None)` is an answer ("not an open chat"), `Err` is a failed lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkIdResolver: Send + Sync {
    async fn resolve_link_id(&self, room_id: &str) -> Result<Option<String>, CacheError>;
}

#[async_trait]
impl LinkIdResolver for IrisClient {
    async fn resolve_link_id(&self, room_id: &str) -> Result<Option<String>, CacheError> {
        self.link_id(room_id).await.map_err(CacheError::Resolve)
    }
}

struct LinkIdEntry {
    link_id: Option<String>,
    fetched_at: Instant,
}

/// Link id cache keyed by room id. Confirmed non-open-chat rooms are cached
/// as `None` just like resolved ids.
#[derive(Clone)]
pub struct LinkIdCache {
    entries: Arc<RwLock<HashMap<String, LinkIdEntry>>>,
    ttl: Duration,
}

impl LinkIdCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Get the link id for `room_id`, consulting `resolver` on a miss.
    ///
    /// Lookup failures are logged and reported as `None` without caching.
    #[instrument(skip(self, resolver))]
    pub async fn get_link_id(&self, room_id: &str, resolver: &dyn LinkIdResolver) -> Option<String> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries
                .get(room_id)
                .filter(|e| e.fetched_at.elapsed() < self.ttl)
            {
                debug!("Link id cache hit");
                return entry.link_id.clone();
            }
        }

        match resolver.resolve_link_id(room_id).await {
            Ok(link_id) => {
                self.entries.write().await.insert(
                    room_id.to_string(),
                    LinkIdEntry {
                        link_id: link_id.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                link_id
            }
            Err(e) => {
                warn!("Link id lookup failed: {}", e);
                None
            }
        }
    }

    /// Drop the cached entry for a room.
    pub async fn invalidate(&self, room_id: &str) -> bool {
        self.entries.write().await.remove(room_id).is_some()
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired link ids", removed);
        }
        removed
    }
}

impl Default for LinkIdCache {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_ID_TTL)
    }
}
