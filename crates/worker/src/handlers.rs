//! 任务处理器
//!
//! 每个任务类型对应一个处理器，worker按编译期处理器表分发。
//! 处理器内的错误由worker循环统一捕获计数，绝不中断消费循环。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use analytics_application::AnalyticsPrecomputeService;
use analytics_domain::entities::{GapSummary, RecommendationSummary, Task, TaskType};
use analytics_domain::messaging::TaskQueue;
use analytics_domain::repositories::PerformanceRepository;
use analytics_domain::services::{GapAnalysisService, RecommendationService};
use analytics_errors::AnalyticsResult;
use analytics_infrastructure::cache::{CacheType, LayeredCacheService};

/// 任务处理器接口
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 处理器名称（用于日志）
    fn name(&self) -> &'static str;

    /// 处理一个任务
    async fn handle(&self, task: &Task) -> AnalyticsResult<()>;
}

/// 单用户分析预计算处理器
pub struct PrecomputeHandler {
    precompute: Arc<AnalyticsPrecomputeService>,
}

impl PrecomputeHandler {
    pub fn new(precompute: Arc<AnalyticsPrecomputeService>) -> Self {
        Self { precompute }
    }
}

#[async_trait]
impl TaskHandler for PrecomputeHandler {
    fn name(&self) -> &'static str {
        "user_analytics_precompute"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let Some(user_id) = task.user_id() else {
            warn!("预计算任务 {} 缺少user_id，跳过", task.id);
            return Ok(());
        };

        self.precompute.compute_and_cache(user_id).await?;
        debug!("用户 {} 的分析预计算完成", user_id);
        Ok(())
    }
}

/// 差距分析更新处理器
pub struct GapAnalysisUpdateHandler {
    gap_analysis: Arc<dyn GapAnalysisService>,
    cache: Arc<LayeredCacheService>,
}

impl GapAnalysisUpdateHandler {
    pub fn new(gap_analysis: Arc<dyn GapAnalysisService>, cache: Arc<LayeredCacheService>) -> Self {
        Self {
            gap_analysis,
            cache,
        }
    }
}

#[async_trait]
impl TaskHandler for GapAnalysisUpdateHandler {
    fn name(&self) -> &'static str {
        "gap_analysis_update"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let Some(user_id) = task.user_id() else {
            warn!("差距分析任务 {} 缺少user_id，跳过", task.id);
            return Ok(());
        };

        let gaps = self.gap_analysis.compute_learning_gaps(user_id).await?;
        let summary = GapSummary::from_gaps(gaps);
        self.cache.cache_learning_gaps(user_id, &summary).await;

        debug!("用户 {} 差距分析更新完成，共 {} 个差距", user_id, summary.total_gaps);
        Ok(())
    }
}

/// 推荐生成处理器
pub struct RecommendationGenerationHandler {
    recommendation_service: Arc<dyn RecommendationService>,
    cache: Arc<LayeredCacheService>,
}

impl RecommendationGenerationHandler {
    pub fn new(
        recommendation_service: Arc<dyn RecommendationService>,
        cache: Arc<LayeredCacheService>,
    ) -> Self {
        Self {
            recommendation_service,
            cache,
        }
    }
}

#[async_trait]
impl TaskHandler for RecommendationGenerationHandler {
    fn name(&self) -> &'static str {
        "recommendation_generation"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let Some(user_id) = task.user_id() else {
            warn!("推荐生成任务 {} 缺少user_id，跳过", task.id);
            return Ok(());
        };

        let recommendations = self
            .recommendation_service
            .compute_recommendations(user_id)
            .await?;
        let summary = RecommendationSummary::from_recommendations(recommendations);
        self.cache.cache_recommendations(user_id, &summary).await;

        debug!(
            "用户 {} 推荐生成完成，共 {} 条有效推荐",
            user_id, summary.active_recommendations
        );
        Ok(())
    }
}

/// 批量分析更新处理器
pub struct BatchAnalyticsHandler {
    precompute: Arc<AnalyticsPrecomputeService>,
}

impl BatchAnalyticsHandler {
    pub fn new(precompute: Arc<AnalyticsPrecomputeService>) -> Self {
        Self { precompute }
    }
}

#[async_trait]
impl TaskHandler for BatchAnalyticsHandler {
    fn name(&self) -> &'static str {
        "batch_analytics_update"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let user_ids = task.user_ids();
        if user_ids.is_empty() {
            warn!("批量分析任务 {} 缺少user_ids，跳过", task.id);
            return Ok(());
        }

        let result = self.precompute.batch_precompute(&user_ids).await;
        info!(
            "批量分析更新完成: {} 成功, {} 失败",
            result.successful.len(),
            result.failed.len()
        );
        Ok(())
    }
}

/// ML模型训练处理器
///
/// 样本不足时跳过训练（仅记录警告），训练成功后缓存模型指标24小时。
pub struct MlTrainingHandler {
    performance_repo: Arc<dyn PerformanceRepository>,
    gap_analysis: Arc<dyn GapAnalysisService>,
    recommendation_service: Arc<dyn RecommendationService>,
    cache: Arc<LayeredCacheService>,
}

impl MlTrainingHandler {
    pub fn new(
        performance_repo: Arc<dyn PerformanceRepository>,
        gap_analysis: Arc<dyn GapAnalysisService>,
        recommendation_service: Arc<dyn RecommendationService>,
        cache: Arc<LayeredCacheService>,
    ) -> Self {
        Self {
            performance_repo,
            gap_analysis,
            recommendation_service,
            cache,
        }
    }

    /// 各模型的训练样本下限与样本拉取上限
    fn training_params(task_type: TaskType) -> (&'static str, usize, usize) {
        match task_type {
            TaskType::GapDetectionTraining => ("gap_detection", 100, 1000),
            TaskType::RecommendationTraining => ("recommendation", 50, 1000),
            TaskType::ConceptMappingTraining => ("concept_mapping", 200, 2000),
            _ => ("unknown", usize::MAX, 0),
        }
    }
}

#[async_trait]
impl TaskHandler for MlTrainingHandler {
    fn name(&self) -> &'static str {
        "ml_training"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let (model_name, min_samples, fetch_limit) = Self::training_params(task.task_type);
        info!("开始训练模型: {}", model_name);

        let records = self.performance_repo.training_records(fetch_limit).await?;
        if records.len() < min_samples {
            warn!(
                "模型 {} 训练样本不足 ({}/{})，跳过本次训练",
                model_name,
                records.len(),
                min_samples
            );
            return Ok(());
        }

        let metrics = match task.task_type {
            TaskType::RecommendationTraining => {
                self.recommendation_service.train_model(&records).await?
            }
            _ => self.gap_analysis.train_model(&records).await?,
        };

        self.cache.cache_model_metrics(model_name, &metrics).await;
        info!(
            "模型 {} 训练完成, accuracy: {:.3}, 样本数: {}",
            model_name, metrics.accuracy, metrics.training_samples
        );
        Ok(())
    }
}

/// 缓存刷新处理器
///
/// 找出最近活跃但缓存已冷的用户，为其调度预计算任务重新预热。
pub struct CacheRefreshHandler {
    performance_repo: Arc<dyn PerformanceRepository>,
    cache: Arc<LayeredCacheService>,
    queue: Arc<dyn TaskQueue>,
    /// 活跃用户回看窗口（小时）
    activity_window_hours: i64,
    /// 单次刷新的用户数上限
    max_users: usize,
}

impl CacheRefreshHandler {
    pub fn new(
        performance_repo: Arc<dyn PerformanceRepository>,
        cache: Arc<LayeredCacheService>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            performance_repo,
            cache,
            queue,
            activity_window_hours: 6,
            max_users: 50,
        }
    }

    /// 刷新任务对应的目标缓存类型
    fn target_cache_type(task_type: TaskType) -> CacheType {
        match task_type {
            TaskType::UserAnalyticsRefresh => CacheType::UserAnalytics,
            TaskType::RecommendationsRefresh => CacheType::Recommendations,
            _ => CacheType::DashboardData,
        }
    }
}

#[async_trait]
impl TaskHandler for CacheRefreshHandler {
    fn name(&self) -> &'static str {
        "cache_refresh"
    }

    async fn handle(&self, task: &Task) -> AnalyticsResult<()> {
        let cache_type = Self::target_cache_type(task.task_type);
        let since = Utc::now() - chrono::Duration::hours(self.activity_window_hours);
        let active_users = self
            .performance_repo
            .recently_active_users(since, self.max_users)
            .await?;

        let mut scheduled = 0;
        for user_id in &active_users {
            let cached: Option<serde_json::Value> = self.cache.get(user_id, cache_type).await;
            if cached.is_none() {
                let refresh_task =
                    Task::analytics_precompute(user_id, "cache_refresh_worker")
                        .with_priority(analytics_domain::entities::TaskPriority::Low);
                if self
                    .queue
                    .enqueue(refresh_task.task_type.queue(), refresh_task)
                    .await
                {
                    scheduled += 1;
                }
            }
        }

        debug!(
            "缓存刷新 ({}) 检查了 {} 个活跃用户，调度 {} 个预计算任务",
            cache_type.as_str(),
            active_users.len(),
            scheduled
        );
        Ok(())
    }
}

/// 组装默认处理器表：每个任务类型对应的处理器在编译期确定
pub fn default_handlers(
    precompute: Arc<AnalyticsPrecomputeService>,
    performance_repo: Arc<dyn PerformanceRepository>,
    gap_analysis: Arc<dyn GapAnalysisService>,
    recommendation_service: Arc<dyn RecommendationService>,
    cache: Arc<LayeredCacheService>,
    queue: Arc<dyn TaskQueue>,
) -> HashMap<TaskType, Arc<dyn TaskHandler>> {
    let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();

    let precompute_handler = Arc::new(PrecomputeHandler::new(precompute.clone()));
    handlers.insert(TaskType::UserAnalyticsPrecompute, precompute_handler);

    handlers.insert(
        TaskType::GapAnalysisUpdate,
        Arc::new(GapAnalysisUpdateHandler::new(
            gap_analysis.clone(),
            cache.clone(),
        )),
    );
    handlers.insert(
        TaskType::RecommendationGeneration,
        Arc::new(RecommendationGenerationHandler::new(
            recommendation_service.clone(),
            cache.clone(),
        )),
    );
    handlers.insert(
        TaskType::BatchAnalyticsUpdate,
        Arc::new(BatchAnalyticsHandler::new(precompute)),
    );

    let ml_training: Arc<dyn TaskHandler> = Arc::new(MlTrainingHandler::new(
        performance_repo.clone(),
        gap_analysis,
        recommendation_service,
        cache.clone(),
    ));
    handlers.insert(TaskType::GapDetectionTraining, ml_training.clone());
    handlers.insert(TaskType::RecommendationTraining, ml_training.clone());
    handlers.insert(TaskType::ConceptMappingTraining, ml_training);

    let cache_refresh: Arc<dyn TaskHandler> =
        Arc::new(CacheRefreshHandler::new(performance_repo, cache, queue));
    handlers.insert(TaskType::DashboardRefresh, cache_refresh.clone());
    handlers.insert(TaskType::UserAnalyticsRefresh, cache_refresh.clone());
    handlers.insert(TaskType::RecommendationsRefresh, cache_refresh);

    handlers
}
