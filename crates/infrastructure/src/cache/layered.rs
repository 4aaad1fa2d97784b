//! Layered cache service
//!
//! Adds to the typed manager: cache-type namespacing, hit/miss/set/delete
//! accounting, a metadata envelope around every value and the
//! get-or-compute primitive. Caching here is a performance optimization,
//! never a correctness dependency: when the backend is unreachable,
//! `get_or_compute` still executes the computation and returns its value.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use analytics_domain::entities::{
    DashboardData, GapSummary, ModelMetrics, PerformanceMetrics, PrecomputedBundle,
    RecommendationSummary,
};
use analytics_errors::AnalyticsResult;

use super::{build_cache_key, CacheManager, CacheStats, CacheTtl, CacheType};

/// Envelope format version; bumped on layout changes
pub const ENVELOPE_VERSION: u32 = 1;

/// Cache key for the periodic worker-metrics snapshot
pub const WORKER_METRICS_KEY: &str = "background_worker_metrics";

/// Metadata envelope wrapped around every cached value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub cache_type: String,
    pub version: u32,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration, cache_type: CacheType) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
            cache_type: cache_type.as_str().to_string(),
            version: ENVELOPE_VERSION,
        }
    }
}

/// Layered cache service owning the cache-key namespace
#[derive(Clone)]
pub struct LayeredCacheService {
    manager: CacheManager,
    ttl: CacheTtl,
    stats: Arc<RwLock<CacheStats>>,
}

impl LayeredCacheService {
    pub fn new(manager: CacheManager, ttl: CacheTtl) -> Self {
        Self {
            manager,
            ttl,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    pub fn ttl(&self) -> &CacheTtl {
        &self.ttl
    }

    /// Set a value under `(id, cache_type)`, wrapped in the metadata envelope
    pub async fn set<T: Serialize>(
        &self,
        id: &str,
        value: &T,
        cache_type: CacheType,
        ttl: Option<Duration>,
    ) -> bool {
        let key = build_cache_key(cache_type, id);
        let ttl = ttl.unwrap_or_else(|| self.ttl.for_type(cache_type));
        let entry = CacheEntry::new(value, ttl, cache_type);

        let success = self.manager.set_json(&key, &entry, Some(ttl)).await;
        if success {
            self.stats.write().await.sets += 1;
            debug!("Cached {} (TTL: {:?})", key, ttl);
        } else {
            self.stats.write().await.errors += 1;
        }
        success
    }

    /// Get a value by `(id, cache_type)`, unwrapping the envelope
    ///
    /// Values written before the envelope was introduced are decoded as the
    /// bare payload.
    pub async fn get<T: DeserializeOwned>(&self, id: &str, cache_type: CacheType) -> Option<T> {
        let key = build_cache_key(cache_type, id);

        let raw: Option<serde_json::Value> = self.manager.get_json(&key).await;
        let Some(raw) = raw else {
            self.stats.write().await.misses += 1;
            debug!("Cache miss: {}", key);
            return None;
        };

        let value = match serde_json::from_value::<CacheEntry<T>>(raw.clone()) {
            Ok(entry) => Some(entry.value),
            // Legacy un-enveloped value
            Err(_) => match serde_json::from_value::<T>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Undecodable cached value for {}: {}", key, e);
                    None
                }
            },
        };

        match value {
            Some(value) => {
                self.stats.write().await.hits += 1;
                debug!("Cache hit: {}", key);
                Some(value)
            }
            None => {
                let mut stats = self.stats.write().await;
                stats.misses += 1;
                stats.errors += 1;
                None
            }
        }
    }

    /// Delete a value by `(id, cache_type)`
    pub async fn delete(&self, id: &str, cache_type: CacheType) -> bool {
        let key = build_cache_key(cache_type, id);
        let deleted = self.manager.delete(&key).await;
        if deleted {
            self.stats.write().await.deletes += 1;
            debug!("Deleted cache entry: {}", key);
        }
        deleted
    }

    /// Get from cache or run the computation and populate the cache
    ///
    /// A failed or unreachable backend reads as a miss, so the computation
    /// always runs and its value is always returned; only a failing
    /// `compute_fn` propagates an error.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        id: &str,
        cache_type: CacheType,
        ttl: Option<Duration>,
        compute_fn: F,
    ) -> AnalyticsResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        if let Some(cached) = self.get::<T>(id, cache_type).await {
            return Ok(cached);
        }

        let computed = compute_fn().await?;

        // Best effort: a failed write must not fail the caller
        if !self.set(id, &computed, cache_type, ttl).await {
            warn!(
                "Failed to cache computed value for {}:{}",
                cache_type.as_str(),
                id
            );
        }

        Ok(computed)
    }

    /// Delete every user-facing cache entry for one user
    pub async fn invalidate_user(&self, user_id: &str) -> bool {
        let mut all_deleted = true;
        for cache_type in CacheType::user_cache_types() {
            if !self.delete(user_id, cache_type).await {
                all_deleted = false;
            }
        }

        if all_deleted {
            info!("Invalidated all cache entries for user {}", user_id);
        } else {
            warn!("Partial cache invalidation for user {}", user_id);
        }
        all_deleted
    }

    /// Snapshot of the accounting counters
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub async fn reset_stats(&self) {
        *self.stats.write().await = CacheStats::default();
        info!("Cache statistics reset");
    }

    pub async fn health_check(&self) -> bool {
        self.manager.health_check().await
    }

    // Typed helpers for the fixed per-user sub-caches

    pub async fn cache_precomputed_bundle(&self, bundle: &PrecomputedBundle) -> bool {
        self.set(
            &bundle.user_id,
            bundle,
            CacheType::PrecomputedAnalytics,
            None,
        )
        .await
    }

    pub async fn get_precomputed_bundle(&self, user_id: &str) -> Option<PrecomputedBundle> {
        self.get(user_id, CacheType::PrecomputedAnalytics).await
    }

    pub async fn cache_dashboard_data(&self, user_id: &str, data: &DashboardData) -> bool {
        self.set(user_id, data, CacheType::DashboardData, None).await
    }

    pub async fn get_dashboard_data(&self, user_id: &str) -> Option<DashboardData> {
        self.get(user_id, CacheType::DashboardData).await
    }

    pub async fn cache_learning_gaps(&self, user_id: &str, gaps: &GapSummary) -> bool {
        self.set(user_id, gaps, CacheType::LearningGaps, None).await
    }

    pub async fn get_learning_gaps(&self, user_id: &str) -> Option<GapSummary> {
        self.get(user_id, CacheType::LearningGaps).await
    }

    pub async fn cache_recommendations(
        &self,
        user_id: &str,
        recommendations: &RecommendationSummary,
    ) -> bool {
        self.set(user_id, recommendations, CacheType::Recommendations, None)
            .await
    }

    pub async fn get_recommendations(&self, user_id: &str) -> Option<RecommendationSummary> {
        self.get(user_id, CacheType::Recommendations).await
    }

    pub async fn cache_model_metrics(&self, model_name: &str, metrics: &ModelMetrics) -> bool {
        self.set(model_name, metrics, CacheType::MlModels, None).await
    }

    pub async fn get_model_metrics(&self, model_name: &str) -> Option<ModelMetrics> {
        self.get(model_name, CacheType::MlModels).await
    }

    /// Periodic snapshot of worker metrics for external observability
    pub async fn cache_worker_metrics(&self, metrics: &PerformanceMetrics) -> bool {
        self.set(
            WORKER_METRICS_KEY,
            metrics,
            CacheType::ComputedResults,
            Some(Duration::from_secs(300)),
        )
        .await
    }

    pub async fn get_worker_metrics(&self) -> Option<PerformanceMetrics> {
        self.get(WORKER_METRICS_KEY, CacheType::ComputedResults).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use analytics_errors::AnalyticsError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that fails every operation, simulating an unreachable backend
    struct UnreachableStore;

    #[async_trait]
    impl CacheStore for UnreachableStore {
        async fn get(&self, _key: &str) -> AnalyticsResult<Option<Vec<u8>>> {
            Err(AnalyticsError::CacheUnavailable("connection refused".to_string()))
        }
        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> AnalyticsResult<()> {
            Err(AnalyticsError::CacheUnavailable("connection refused".to_string()))
        }
        async fn delete(&self, _key: &str) -> AnalyticsResult<bool> {
            Err(AnalyticsError::CacheUnavailable("connection refused".to_string()))
        }
        async fn health_check(&self) -> AnalyticsResult<bool> {
            Ok(false)
        }
    }

    fn service_with(store: Arc<dyn CacheStore>) -> LayeredCacheService {
        let manager = CacheManager::new(store, Duration::from_secs(3600));
        LayeredCacheService::new(manager, CacheTtl::default())
    }

    fn service() -> (LayeredCacheService, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        (service_with(store.clone()), store)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip_through_envelope() {
        let (cache, _) = service();
        let value = serde_json::json!({ "score": 42 });

        assert!(
            cache
                .set("u1", &value, CacheType::DashboardData, None)
                .await
        );
        // Idempotent: setting the same value twice still round-trips
        assert!(
            cache
                .set("u1", &value, CacheType::DashboardData, None)
                .await
        );

        let loaded: Option<serde_json::Value> = cache.get("u1", CacheType::DashboardData).await;
        assert_eq!(loaded, Some(value));

        let stats = cache.stats().await;
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_envelope_metadata_written() {
        let (cache, store) = service();
        cache
            .set("u1", &serde_json::json!(1), CacheType::LearningGaps, None)
            .await;

        let raw = store.get("gaps:u1").await.unwrap().unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(envelope["cache_type"], "gaps");
        assert_eq!(envelope["version"], ENVELOPE_VERSION);
        assert_eq!(envelope["ttl_seconds"], 1800);
        assert!(envelope.get("cached_at").is_some());
    }

    #[tokio::test]
    async fn test_legacy_unenveloped_value_readable() {
        let (cache, store) = service();
        // Value written by the pre-envelope format: the bare payload
        store
            .set(
                "dashboard:u1",
                br#"{"score": 7}"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let loaded: Option<serde_json::Value> = cache.get("u1", CacheType::DashboardData).await;
        assert_eq!(loaded, Some(serde_json::json!({ "score": 7 })));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_namespacing_prevents_collisions() {
        let (cache, _) = service();
        cache
            .set("u1", &serde_json::json!("gaps"), CacheType::LearningGaps, None)
            .await;
        cache
            .set(
                "u1",
                &serde_json::json!("dashboard"),
                CacheType::DashboardData,
                None,
            )
            .await;

        let gaps: Option<serde_json::Value> = cache.get("u1", CacheType::LearningGaps).await;
        let dash: Option<serde_json::Value> = cache.get("u1", CacheType::DashboardData).await;
        assert_eq!(gaps, Some(serde_json::json!("gaps")));
        assert_eq!(dash, Some(serde_json::json!("dashboard")));
    }

    #[tokio::test]
    async fn test_get_or_compute_hit_skips_computation() {
        let (cache, _) = service();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute("u1", CacheType::DashboardData, None, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({ "score": 42 }))
                }
            })
            .await
            .unwrap();
        assert_eq!(first, serde_json::json!({ "score": 42 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Within TTL: served from cache, compute not invoked again
        let second = cache
            .get_or_compute("u1", CacheType::DashboardData, None, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({ "score": 0 }))
                }
            })
            .await
            .unwrap();
        assert_eq!(second, serde_json::json!({ "score": 42 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_with_unreachable_backend() {
        let cache = service_with(Arc::new(UnreachableStore));

        let value = cache
            .get_or_compute("u1", CacheType::DashboardData, None, || async {
                Ok(serde_json::json!({ "score": 42 }))
            })
            .await
            .unwrap();

        // Computation still runs and its result is returned
        assert_eq!(value, serde_json::json!({ "score": 42 }));
    }

    #[tokio::test]
    async fn test_get_or_compute_propagates_compute_error() {
        let (cache, _) = service();

        let result: AnalyticsResult<serde_json::Value> = cache
            .get_or_compute("u1", CacheType::DashboardData, None, || async {
                Err(AnalyticsError::Computation("upstream failed".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AnalyticsError::Computation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_respected() {
        let (cache, _) = service();
        cache
            .set(
                "u1",
                &serde_json::json!(1),
                CacheType::DashboardData,
                Some(Duration::from_secs(300)),
            )
            .await;

        tokio::time::advance(Duration::from_secs(299)).await;
        let hit: Option<serde_json::Value> = cache.get("u1", CacheType::DashboardData).await;
        assert!(hit.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        let miss: Option<serde_json::Value> = cache.get("u1", CacheType::DashboardData).await;
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_user_clears_all_types() {
        let (cache, _) = service();
        for cache_type in CacheType::user_cache_types() {
            cache
                .set("u1", &serde_json::json!("x"), cache_type, None)
                .await;
        }

        assert!(cache.invalidate_user("u1").await);

        for cache_type in CacheType::user_cache_types() {
            let value: Option<serde_json::Value> = cache.get("u1", cache_type).await;
            assert!(value.is_none());
        }
    }

    #[tokio::test]
    async fn test_typed_bundle_helpers() {
        let (cache, _) = service();
        let bundle = PrecomputedBundle::empty("u1", 1800);

        assert!(cache.cache_precomputed_bundle(&bundle).await);
        let loaded = cache.get_precomputed_bundle("u1").await.unwrap();
        assert_eq!(loaded.user_id, "u1");

        assert!(cache.get_precomputed_bundle("other").await.is_none());
    }
}
