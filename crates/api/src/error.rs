use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use analytics_errors::AnalyticsError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("分析服务错误: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::Analytics(AnalyticsError::UserNotFound { .. }) | ApiError::NotFound => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            ApiError::Analytics(AnalyticsError::QueueFull { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL")
            }
            ApiError::Analytics(AnalyticsError::Configuration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION")
            }
            ApiError::BadRequest(_) | ApiError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = Json(json!({
            "success": false,
            "error_type": error_type,
            "message": self.to_string(),
            "timestamp": chrono::Utc::now(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
