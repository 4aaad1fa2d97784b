//! Redis cache store implementation

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use analytics_errors::{AnalyticsError, AnalyticsResult};

use super::{CacheConfig, CacheStore};

/// Redis-backed cache store with bounded per-command timeouts
///
/// A degraded backend must never stall the read path: every command is
/// wrapped in a timeout and a timed-out read is reported as an error the
/// upper layers treat as a miss.
pub struct RedisCacheStore {
    client: Arc<redis::Client>,
    command_timeout: Duration,
    key_prefix: String,
}

impl RedisCacheStore {
    /// Create a new Redis cache store and verify connectivity
    pub async fn new(config: &CacheConfig) -> AnalyticsResult<Self> {
        config.validate()?;

        info!("Creating Redis cache store with URL: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())
            .map_err(|e| AnalyticsError::CacheUnavailable(e.to_string()))?;

        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AnalyticsError::CacheUnavailable(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AnalyticsError::CacheUnavailable(e.to_string()))?;

        let key_prefix = config
            .key_prefix
            .clone()
            .unwrap_or_else(|| "analytics".to_string());

        info!("Redis cache store created successfully");

        Ok(Self {
            client: Arc::new(client),
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
            key_prefix,
        })
    }

    async fn get_connection(&self) -> AnalyticsResult<redis::aio::ConnectionManager> {
        self.client
            .get_connection_manager()
            .await
            .map_err(|e| AnalyticsError::CacheUnavailable(e.to_string()))
    }

    /// Build full cache key with instance prefix
    fn build_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    /// Run a redis command future under the configured timeout
    async fn with_timeout<T, F>(&self, op: &str, fut: F) -> AnalyticsResult<T>
    where
        F: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Cache {} failed: {}", op, e);
                Err(AnalyticsError::Cache(e.to_string()))
            }
            Err(_) => {
                error!("Cache {} timed out after {:?}", op, self.command_timeout);
                Err(AnalyticsError::Timeout(format!("cache {op}")))
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> AnalyticsResult<Option<Vec<u8>>> {
        let full_key = self.build_key(key);
        debug!("Cache GET: {}", full_key);

        let mut conn = self.get_connection().await?;
        let result: Option<Vec<u8>> = self
            .with_timeout("GET", async {
                redis::cmd("GET").arg(&full_key).query_async(&mut conn).await
            })
            .await?;

        Ok(result)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AnalyticsResult<()> {
        let full_key = self.build_key(key);
        debug!("Cache SET: {} with TTL: {:?}", full_key, ttl);

        let mut conn = self.get_connection().await?;
        let ttl_seconds = ttl.as_secs().max(1) as i64;
        let _: () = self
            .with_timeout("SETEX", async {
                redis::cmd("SETEX")
                    .arg(&full_key)
                    .arg(ttl_seconds)
                    .arg(value)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> AnalyticsResult<bool> {
        let full_key = self.build_key(key);
        debug!("Cache DELETE: {}", full_key);

        let mut conn = self.get_connection().await?;
        let deleted: i32 = self
            .with_timeout("DEL", async {
                redis::cmd("DEL").arg(&full_key).query_async(&mut conn).await
            })
            .await?;

        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> AnalyticsResult<bool> {
        let mut conn = self.get_connection().await?;
        let result: String = self
            .with_timeout("PING", async {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;

        Ok(result == "PONG")
    }
}
