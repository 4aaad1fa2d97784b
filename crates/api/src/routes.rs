use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use analytics_application::{AnalyticsPrecomputeService, DashboardService};
use analytics_domain::messaging::TaskQueue;
use analytics_infrastructure::cache::LayeredCacheService;
use analytics_worker::WorkerPool;

use crate::handlers::{
    cache::{invalidate_user_cache, warm_user_cache},
    dashboard::get_dashboard_data,
    health::health_check,
    monitoring::{get_cache_stats, get_performance_metrics, get_queue_status, render_prometheus},
    tasks::{schedule_analytics_task, schedule_ml_training_task},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<DashboardService>,
    pub precompute: Arc<AnalyticsPrecomputeService>,
    pub cache: Arc<LayeredCacheService>,
    pub queue: Arc<dyn TaskQueue>,
    pub worker_pool: Arc<WorkerPool>,
    pub prometheus: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 看板读路径
        .route("/api/dashboard/{user_id}", get(get_dashboard_data))
        // 任务调度API
        .route("/api/tasks/analytics", post(schedule_analytics_task))
        .route("/api/tasks/ml-training", post(schedule_ml_training_task))
        // 缓存管理API
        .route("/api/cache/{user_id}/warm", post(warm_user_cache))
        .route("/api/cache/{user_id}/invalidate", post(invalidate_user_cache))
        .route("/api/cache/stats", get(get_cache_stats))
        // 系统监控API
        .route("/api/queues/status", get(get_queue_status))
        .route("/api/system/metrics", get(get_performance_metrics))
        .route("/metrics", get(render_prometheus))
        .with_state(state)
}
