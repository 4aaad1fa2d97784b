pub mod cache;
pub mod metrics;
pub mod queue;
pub mod repository;

pub use cache::{
    build_cache_key, CacheConfig, CacheManager, CacheStats, CacheStore, CacheTtl, CacheType,
    LayeredCacheService, MemoryCacheStore, RedisCacheStore,
};
pub use metrics::MetricsCollector;
pub use queue::{QueueConfig, TaskQueueManager};
