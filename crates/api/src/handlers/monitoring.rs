use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use analytics_domain::entities::PerformanceMetrics;
use analytics_domain::messaging::QueueStatus;

use crate::error::ApiResult;
use crate::response::{success, ApiResponse};
use crate::routes::AppState;

/// 获取队列状态（深度 + 运行标志）
pub async fn get_queue_status(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<QueueStatus>> {
    Ok(success(state.worker_pool.get_queue_status().await))
}

/// 获取Worker性能指标快照
pub async fn get_performance_metrics(
    State(state): State<AppState>,
) -> ApiResult<ApiResponse<PerformanceMetrics>> {
    Ok(success(state.worker_pool.get_performance_metrics().await))
}

/// 获取缓存统计
pub async fn get_cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats().await;
    Json(json!({
        "success": true,
        "data": {
            "hits": stats.hits,
            "misses": stats.misses,
            "sets": stats.sets,
            "deletes": stats.deletes,
            "errors": stats.errors,
            "hit_rate": stats.hit_rate(),
        },
        "timestamp": chrono::Utc::now(),
    }))
}

/// Prometheus指标导出
pub async fn render_prometheus(State(state): State<AppState>) -> String {
    match state.prometheus {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}
