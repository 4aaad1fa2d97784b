use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("缓存错误: {0}")]
    Cache(String),
    #[error("缓存后端不可达: {0}")]
    CacheUnavailable(String),
    #[error("数据存储错误: {0}")]
    DataStore(String),
    #[error("用户未找到: {id}")]
    UserNotFound { id: String },
    #[error("任务队列错误: {0}")]
    TaskQueue(String),
    #[error("队列已满: {queue}")]
    QueueFull { queue: String },
    #[error("任务处理错误: {0}")]
    TaskExecution(String),
    #[error("未注册的任务类型: {task_type}")]
    UnknownTaskType { task_type: String },
    #[error("分析计算错误: {0}")]
    Computation(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization(err.to_string())
    }
}

impl AnalyticsError {
    /// 错误是否为暂时性错误（调用方可以按缓存未命中处理并继续）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Cache(_)
                | AnalyticsError::CacheUnavailable(_)
                | AnalyticsError::Timeout(_)
        )
    }

    /// 错误分类标签，用于日志和指标
    pub fn category(&self) -> &'static str {
        match self {
            AnalyticsError::Cache(_) | AnalyticsError::CacheUnavailable(_) => "cache",
            AnalyticsError::DataStore(_) | AnalyticsError::UserNotFound { .. } => "data_store",
            AnalyticsError::TaskQueue(_) | AnalyticsError::QueueFull { .. } => "task_queue",
            AnalyticsError::TaskExecution(_) | AnalyticsError::UnknownTaskType { .. } => "worker",
            AnalyticsError::Computation(_) => "computation",
            AnalyticsError::Serialization(_) => "serialization",
            AnalyticsError::Configuration(_) => "configuration",
            AnalyticsError::Timeout(_) => "timeout",
            AnalyticsError::Internal(_) => "internal",
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests;
