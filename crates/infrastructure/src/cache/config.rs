//! Cache configuration for the analytics cache stack

use serde::{Deserialize, Serialize};
use std::time::Duration;

use analytics_errors::{AnalyticsError, AnalyticsResult};

use super::CacheType;

/// Cache backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the Redis backend is used; false selects the in-memory store
    pub use_redis: bool,
    /// Redis connection URL
    pub redis_url: String,
    /// Command timeout in seconds; a timed-out read is treated as a miss
    pub command_timeout_seconds: u64,
    /// Cache key prefix for this instance
    pub key_prefix: Option<String>,
    /// Default TTL for cache entries
    pub default_ttl_seconds: u64,
    /// Cache-type-specific TTL configurations
    pub ttl: CacheTtlConfig,
}

/// Per-cache-type TTL configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    /// Precomputed analytics bundle TTL in seconds
    pub precomputed_seconds: u64,
    /// Dashboard data TTL in seconds
    pub dashboard_seconds: u64,
    /// Learning gaps TTL in seconds
    pub gaps_seconds: u64,
    /// Recommendations TTL in seconds
    pub recommendations_seconds: u64,
    /// User analytics TTL in seconds
    pub user_analytics_seconds: u64,
    /// ML model metrics TTL in seconds
    pub ml_models_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_redis: false,
            redis_url: "redis://localhost:6379".to_string(),
            command_timeout_seconds: 3,
            key_prefix: Some("analytics".to_string()),
            default_ttl_seconds: 3600,
            ttl: CacheTtlConfig::default(),
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            precomputed_seconds: 1800,    // 30 minutes
            dashboard_seconds: 300,       // 5 minutes
            gaps_seconds: 1800,           // 30 minutes
            recommendations_seconds: 3600, // 1 hour
            user_analytics_seconds: 1800, // 30 minutes
            ml_models_seconds: 86400,     // 24 hours
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.use_redis {
            if self.redis_url.is_empty() {
                return Err(AnalyticsError::Configuration(
                    "Redis URL cannot be empty".to_string(),
                ));
            }
            if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://")
            {
                return Err(AnalyticsError::Configuration(
                    "Redis URL must start with redis:// or rediss://".to_string(),
                ));
            }
            if self.command_timeout_seconds == 0 {
                return Err(AnalyticsError::Configuration(
                    "Command timeout must be greater than 0".to_string(),
                ));
            }
        }
        if self.default_ttl_seconds == 0 {
            return Err(AnalyticsError::Configuration(
                "Default TTL must be greater than 0".to_string(),
            ));
        }
        self.ttl.validate()
    }
}

impl CacheTtlConfig {
    /// Validate TTL configuration
    pub fn validate(&self) -> AnalyticsResult<()> {
        for (name, value) in [
            ("precomputed", self.precomputed_seconds),
            ("dashboard", self.dashboard_seconds),
            ("gaps", self.gaps_seconds),
            ("recommendations", self.recommendations_seconds),
            ("user_analytics", self.user_analytics_seconds),
            ("ml_models", self.ml_models_seconds),
        ] {
            if value == 0 {
                return Err(AnalyticsError::Configuration(format!(
                    "{name} TTL must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    /// Convert to CacheTtl
    pub fn to_cache_ttl(&self, default_ttl_seconds: u64) -> CacheTtl {
        CacheTtl {
            precomputed: Duration::from_secs(self.precomputed_seconds),
            dashboard: Duration::from_secs(self.dashboard_seconds),
            gaps: Duration::from_secs(self.gaps_seconds),
            recommendations: Duration::from_secs(self.recommendations_seconds),
            user_analytics: Duration::from_secs(self.user_analytics_seconds),
            ml_models: Duration::from_secs(self.ml_models_seconds),
            default: Duration::from_secs(default_ttl_seconds),
        }
    }
}

/// Resolved cache TTLs by cache type
#[derive(Debug, Clone)]
pub struct CacheTtl {
    pub precomputed: Duration,
    pub dashboard: Duration,
    pub gaps: Duration,
    pub recommendations: Duration,
    pub user_analytics: Duration,
    pub ml_models: Duration,
    pub default: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        CacheTtlConfig::default().to_cache_ttl(3600)
    }
}

impl CacheTtl {
    /// TTL for a specific cache type
    pub fn for_type(&self, cache_type: CacheType) -> Duration {
        match cache_type {
            CacheType::PrecomputedAnalytics => self.precomputed,
            CacheType::DashboardData => self.dashboard,
            CacheType::LearningGaps => self.gaps,
            CacheType::Recommendations => self.recommendations,
            CacheType::UserAnalytics => self.user_analytics,
            CacheType::MlModels => self.ml_models,
            CacheType::AggregatedData | CacheType::ComputedResults => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert!(!config.use_redis);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.default_ttl_seconds, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_validation() {
        let mut config = CacheConfig {
            use_redis: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.redis_url = "".to_string();
        assert!(config.validate().is_err());

        config.redis_url = "http://localhost:6379".to_string();
        assert!(config.validate().is_err());

        config.redis_url = "redis://localhost:6379".to_string();
        config.command_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_for_type() {
        let ttl = CacheTtl::default();
        assert_eq!(
            ttl.for_type(CacheType::PrecomputedAnalytics),
            Duration::from_secs(1800)
        );
        assert_eq!(
            ttl.for_type(CacheType::DashboardData),
            Duration::from_secs(300)
        );
        assert_eq!(
            ttl.for_type(CacheType::MlModels),
            Duration::from_secs(86400)
        );
        assert_eq!(
            ttl.for_type(CacheType::ComputedResults),
            Duration::from_secs(3600)
        );
    }
}
