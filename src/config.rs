//! 应用配置
//!
//! 配置来源分层：TOML配置文件 + `ANALYTICS__`前缀的环境变量覆盖。
//! 各组件的配置结构体由组件所在crate定义，这里只做聚合。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use analytics_application::{DashboardConfig, PrecomputeConfig};
use analytics_dispatcher::SchedulerConfig;
use analytics_infrastructure::cache::CacheConfig;
use analytics_infrastructure::queue::QueueConfig;

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Worker池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 出队轮询超时（毫秒）
    pub poll_timeout_ms: u64,
    /// 性能监控间隔（秒）
    pub monitoring_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            monitoring_interval_seconds: 60,
        }
    }
}

/// 应用聚合配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub precompute: PrecomputeConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// 加载配置：文件可缺省，环境变量优先
    pub fn load(config_path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("ANALYTICS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("构建配置失败")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("解析配置失败")?;

        app_config.cache.validate().context("缓存配置无效")?;

        Ok(app_config)
    }
}
