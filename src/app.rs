//! 应用装配与运行
//!
//! 按依赖顺序装配全部组件：缓存存储 → 缓存栈 → 队列 → 预计算/看板服务
//! → Worker池 → 周期调度器 → API服务。零配置模式使用内存存储与
//! 内嵌数据适配器，生产模式切换Redis后端。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use analytics_api::{create_routes, AppState};
use analytics_application::{AnalyticsPrecomputeService, DashboardService};
use analytics_dispatcher::PeriodicScheduler;
use analytics_domain::messaging::TaskQueue;
use analytics_domain::repositories::{
    GapRepository, PerformanceRepository, RecommendationRepository,
};
use analytics_domain::services::{GapAnalysisService, RecommendationService};
use analytics_infrastructure::cache::{
    CacheManager, CacheStore, LayeredCacheService, MemoryCacheStore, RedisCacheStore,
};
use analytics_infrastructure::metrics::MetricsCollector;
use analytics_infrastructure::queue::TaskQueueManager;
use analytics_infrastructure::repository::{
    HeuristicGapAnalysis, HeuristicRecommendationService, MemoryGapRepository,
    MemoryPerformanceRepository, MemoryRecommendationRepository,
};
use analytics_worker::{default_handlers, WorkerPool};

use crate::config::AppConfig;

/// 应用运行模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行API服务器
    Api,
    /// 仅运行Worker与调度器
    Worker,
    /// 运行所有组件
    All,
}

impl AppMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "api" => Some(AppMode::Api),
            "worker" => Some(AppMode::Worker),
            "all" => Some(AppMode::All),
            _ => None,
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    cache: Arc<LayeredCacheService>,
    queue: Arc<TaskQueueManager>,
    precompute: Arc<AnalyticsPrecomputeService>,
    dashboard: Arc<DashboardService>,
    worker_pool: Arc<WorkerPool>,
    scheduler: Arc<PeriodicScheduler>,
    prometheus: Option<PrometheusHandle>,
}

impl Application {
    /// 创建新的应用实例，完成全部组件装配
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        // 缓存存储后端
        let store: Arc<dyn CacheStore> = if config.cache.use_redis {
            info!("使用Redis缓存后端: {}", config.cache.redis_url);
            Arc::new(
                RedisCacheStore::new(&config.cache)
                    .await
                    .context("创建Redis缓存存储失败")?,
            )
        } else {
            info!("使用内存缓存后端（嵌入式模式）");
            Arc::new(MemoryCacheStore::new())
        };

        let manager = CacheManager::new(
            store,
            Duration::from_secs(config.cache.default_ttl_seconds),
        );
        let cache = Arc::new(LayeredCacheService::new(
            manager,
            config
                .cache
                .ttl
                .to_cache_ttl(config.cache.default_ttl_seconds),
        ));

        // 任务队列与指标
        let queue = Arc::new(TaskQueueManager::new(config.queues.clone()));
        let metrics = Arc::new(MetricsCollector::new());

        // Prometheus导出器（重复安装时降级为无导出）
        let prometheus = match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("安装Prometheus导出器失败: {}", e);
                None
            }
        };

        // 数据端口：嵌入式内存适配器（真实文档存储是外部协作方）
        let performance_repo: Arc<dyn PerformanceRepository> =
            Arc::new(MemoryPerformanceRepository::new());
        let gap_repo: Arc<dyn GapRepository> = Arc::new(MemoryGapRepository::new());
        let recommendation_repo: Arc<dyn RecommendationRepository> =
            Arc::new(MemoryRecommendationRepository::new());

        // 算法端口：嵌入式启发式适配器
        let gap_analysis: Arc<dyn GapAnalysisService> =
            Arc::new(HeuristicGapAnalysis::new(performance_repo.clone()));
        let recommendation_service: Arc<dyn RecommendationService> =
            Arc::new(HeuristicRecommendationService::new(gap_analysis.clone()));

        let task_queue: Arc<dyn TaskQueue> = queue.clone();

        // 预计算编排器与看板服务
        let precompute = Arc::new(AnalyticsPrecomputeService::new(
            performance_repo.clone(),
            gap_analysis.clone(),
            recommendation_service.clone(),
            cache.clone(),
            task_queue.clone(),
            config.precompute.clone(),
        ));

        let dashboard = Arc::new(DashboardService::new(
            cache.clone(),
            performance_repo.clone(),
            gap_repo,
            recommendation_repo,
            precompute.clone(),
            config.dashboard.clone(),
        ));

        // Worker池，注册全部任务处理器
        let handlers = default_handlers(
            precompute.clone(),
            performance_repo.clone(),
            gap_analysis,
            recommendation_service,
            cache.clone(),
            task_queue.clone(),
        );
        let worker_pool = Arc::new(
            WorkerPool::builder(task_queue.clone(), metrics, cache.clone())
                .poll_timeout_ms(config.worker.poll_timeout_ms)
                .monitoring_interval_seconds(config.worker.monitoring_interval_seconds)
                .register_handlers(handlers)
                .build(),
        );

        // 周期调度器
        let scheduler = Arc::new(PeriodicScheduler::new(
            task_queue,
            performance_repo,
            config.scheduler.clone(),
        ));

        Ok(Self {
            config,
            mode,
            cache,
            queue,
            precompute,
            dashboard,
            worker_pool,
            scheduler,
            prometheus,
        })
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::Worker => self.run_worker(shutdown_rx).await,
            AppMode::All => self.run_all(shutdown_rx).await,
        }
    }

    async fn run_worker(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.worker_pool
            .start()
            .await
            .context("启动Worker池失败")?;
        self.scheduler
            .start()
            .await
            .context("启动周期调度器失败")?;

        let _ = shutdown_rx.recv().await;

        self.scheduler.stop().await;
        self.worker_pool.stop().await;
        Ok(())
    }

    async fn run_api(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.serve_api(shutdown_rx).await
    }

    async fn run_all(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.worker_pool
            .start()
            .await
            .context("启动Worker池失败")?;
        self.scheduler
            .start()
            .await
            .context("启动周期调度器失败")?;

        let result = self.serve_api(shutdown_rx).await;

        self.scheduler.stop().await;
        self.worker_pool.stop().await;
        result
    }

    async fn serve_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let state = AppState {
            dashboard: self.dashboard.clone(),
            precompute: self.precompute.clone(),
            cache: self.cache.clone(),
            queue: self.queue.clone(),
            worker_pool: self.worker_pool.clone(),
            prometheus: self.prometheus.clone(),
        };
        let router = create_routes(state)
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::cors::CorsLayer::permissive());

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("绑定地址失败: {addr}"))?;
        info!("API服务监听: {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务收到关闭信号");
            })
            .await
            .map_err(|e| {
                error!("API服务异常退出: {}", e);
                anyhow::anyhow!(e)
            })
    }
}
