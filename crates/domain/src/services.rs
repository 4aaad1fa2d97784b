use async_trait::async_trait;

use crate::entities::{LearningGap, ModelMetrics, PerformanceRecord, Recommendation};
use analytics_errors::AnalyticsResult;

/// 差距分析算法端口（外部计算，内部实现不在本系统范围内）
#[async_trait]
pub trait GapAnalysisService: Send + Sync {
    /// 为用户计算学习差距
    async fn compute_learning_gaps(&self, user_id: &str) -> AnalyticsResult<Vec<LearningGap>>;

    /// 用训练样本重新训练差距检测模型
    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics>;
}

/// 推荐算法端口（外部计算）
#[async_trait]
pub trait RecommendationService: Send + Sync {
    /// 为用户生成学习资源推荐
    async fn compute_recommendations(
        &self,
        user_id: &str,
    ) -> AnalyticsResult<Vec<Recommendation>>;

    /// 用训练样本重新训练推荐模型
    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics>;
}
