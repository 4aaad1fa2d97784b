use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{LearningGap, PerformanceRecord, Recommendation};
use analytics_errors::AnalyticsResult;

/// 学习表现数据仓储端口（文档存储的窄接口）
#[async_trait]
pub trait PerformanceRepository: Send + Sync {
    /// 查询某用户自since以来的表现记录
    async fn fetch_recent_performance(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceRecord>>;

    /// 查询最近活跃用户（last_login >= since），按limit截断
    async fn recently_active_users(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AnalyticsResult<Vec<String>>;

    /// 拉取模型训练样本
    async fn training_records(&self, limit: usize) -> AnalyticsResult<Vec<PerformanceRecord>>;
}

/// 已存储差距的仓储端口（实时读路径使用）
#[async_trait]
pub trait GapRepository: Send + Sync {
    /// 查询严重度不低于min_severity的差距，按严重度降序截断
    async fn significant_gaps(
        &self,
        user_id: &str,
        min_severity: f64,
        limit: usize,
    ) -> AnalyticsResult<Vec<LearningGap>>;
}

/// 已存储推荐的仓储端口（实时读路径使用）
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// 查询未完成的推荐，按优先级分数降序截断
    async fn active_recommendations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> AnalyticsResult<Vec<Recommendation>>;
}
