//! Caching infrastructure for precomputed analytics
//!
//! This module provides the layered caching stack used on the login/dashboard
//! read path: a byte-oriented store behind the `CacheStore` trait, a typed
//! JSON wrapper, and the layered service that adds namespacing, hit/miss
//! accounting and the get-or-compute primitive.

pub mod config;
pub mod layered;
pub mod manager;
pub mod memory;
pub mod store;

use async_trait::async_trait;
pub use config::*;
pub use layered::*;
pub use manager::*;
pub use memory::*;
pub use store::*;

use analytics_errors::AnalyticsResult;

/// Cache key prefix patterns for different data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    UserAnalytics,
    DashboardData,
    LearningGaps,
    Recommendations,
    PrecomputedAnalytics,
    MlModels,
    AggregatedData,
    ComputedResults,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::UserAnalytics => "analytics:user",
            CacheType::DashboardData => "dashboard",
            CacheType::LearningGaps => "gaps",
            CacheType::Recommendations => "recommendations",
            CacheType::PrecomputedAnalytics => "precomputed_analytics",
            CacheType::MlModels => "models",
            CacheType::AggregatedData => "aggregated",
            CacheType::ComputedResults => "computed",
        }
    }

    /// Cache types invalidated together on profile mutation or account deletion
    pub fn user_cache_types() -> [CacheType; 4] {
        [
            CacheType::UserAnalytics,
            CacheType::DashboardData,
            CacheType::LearningGaps,
            CacheType::Recommendations,
        ]
    }
}

/// Build full cache key from type prefix and id
pub fn build_cache_key(cache_type: CacheType, id: &str) -> String {
    format!("{}:{}", cache_type.as_str(), id)
}

/// Cache statistics and metrics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    pub fn error_rate(&self) -> f64 {
        let total_ops = self.hits + self.misses + self.sets + self.deletes;
        if total_ops == 0 {
            0.0
        } else {
            self.errors as f64 / total_ops as f64
        }
    }
}

/// Byte-oriented cache store trait; expiration is enforced by the store
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a raw value from the store
    async fn get(&self, key: &str) -> AnalyticsResult<Option<Vec<u8>>>;

    /// Set a raw value with TTL
    async fn set(&self, key: &str, value: &[u8], ttl: std::time::Duration) -> AnalyticsResult<()>;

    /// Delete a value; returns whether the key existed
    async fn delete(&self, key: &str) -> AnalyticsResult<bool>;

    /// Health check for the backing store
    async fn health_check(&self) -> AnalyticsResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_type_prefixes() {
        assert_eq!(CacheType::DashboardData.as_str(), "dashboard");
        assert_eq!(CacheType::LearningGaps.as_str(), "gaps");
        assert_eq!(CacheType::UserAnalytics.as_str(), "analytics:user");
        assert_eq!(
            CacheType::PrecomputedAnalytics.as_str(),
            "precomputed_analytics"
        );
    }

    #[test]
    fn test_cache_key_building() {
        assert_eq!(
            build_cache_key(CacheType::DashboardData, "user-1"),
            "dashboard:user-1"
        );
        assert_eq!(
            build_cache_key(CacheType::PrecomputedAnalytics, "user-1"),
            "precomputed_analytics:user-1"
        );
    }

    #[test]
    fn test_cache_stats_rates() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            sets: 10,
            deletes: 5,
            errors: 2,
        };
        assert!((stats.hit_rate() - 0.8).abs() < f64::EPSILON);
        assert!((stats.miss_rate() - 0.2).abs() < f64::EPSILON);
        assert!((stats.error_rate() - 2.0 / 115.0).abs() < f64::EPSILON);

        let empty = CacheStats::default();
        assert_eq!(empty.hit_rate(), 0.0);
        assert_eq!(empty.error_rate(), 0.0);
    }
}
