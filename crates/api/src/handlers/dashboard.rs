use axum::extract::{Path, State};

use analytics_domain::entities::DashboardData;

use crate::error::ApiResult;
use crate::response::{success, ApiResponse};
use crate::routes::AppState;

/// 获取用户看板数据
///
/// 读路径永不失败：最坏情况下返回带error来源标记的零值数据。
pub async fn get_dashboard_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ApiResponse<DashboardData>> {
    let data = state.dashboard.get_dashboard_data(&user_id).await;
    Ok(success(data))
}
