use axum::extract::{Path, State};
use serde_json::json;

use crate::error::ApiResult;
use crate::response::{success, ApiResponse};
use crate::routes::AppState;

/// 为用户预热缓存（同步执行一次预计算并写入全部子缓存）
pub async fn warm_user_cache(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    let warmed = state.precompute.warm_cache_for_user(&user_id).await;
    Ok(success(json!({ "user_id": user_id, "warmed": warmed })))
}

/// 清除用户的全部缓存
pub async fn invalidate_user_cache(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    let invalidated = state.dashboard.invalidate_user_cache(&user_id).await;
    Ok(success(
        json!({ "user_id": user_id, "invalidated": invalidated }),
    ))
}
