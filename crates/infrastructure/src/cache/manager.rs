//! Thin typed wrapper over the cache store
//!
//! Serialization plus default TTL only; no business knowledge. Backend
//! failures are swallowed here: `get` degrades to a miss, `set`/`delete`
//! report `false`. Callers never see a cache error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::CacheStore;

/// Typed cache manager over an arbitrary byte store
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get and deserialize a value; backend errors and decode failures are a miss
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to get cache for key {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to decode cached value for key {}: {}", key, e);
                None
            }
        }
    }

    /// Serialize and store a value with TTL (default TTL when None)
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize value for key {}: {}", key, e);
                return false;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        match self.store.set(key, &bytes, ttl).await {
            Ok(()) => {
                debug!("Cached key {} (TTL: {:?})", key, ttl);
                true
            }
            Err(e) => {
                warn!("Failed to set cache for key {}: {}", key, e);
                false
            }
        }
    }

    /// Delete a key; backend errors report false
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Failed to delete cache for key {}: {}", key, e);
                false
            }
        }
    }

    /// Backend health; errors report false
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }
}
