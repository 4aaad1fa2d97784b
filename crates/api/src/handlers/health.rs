use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let cache_healthy = state.cache.health_check().await;
    let workers_running = state.worker_pool.is_running().await;

    Json(json!({
        "status": if cache_healthy { "ok" } else { "degraded" },
        "cache_healthy": cache_healthy,
        "workers_running": workers_running,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "learning-analytics",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
