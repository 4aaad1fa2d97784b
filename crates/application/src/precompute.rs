//! 分析预计算服务
//!
//! 后台预计算单用户的分析数据（表现汇总、学习差距、推荐、进度趋势），
//! 聚合为单个结果包写入缓存，保证登录路径的快速响应。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use analytics_domain::entities::{
    DashboardData, GapSummary, PerformanceRecord, PerformanceSummary, PrecomputedBundle,
    ProgressTrends, RecommendationSummary, Task, WeeklyProgress,
};
use analytics_domain::messaging::TaskQueue;
use analytics_domain::repositories::PerformanceRepository;
use analytics_domain::services::{GapAnalysisService, RecommendationService};
use analytics_errors::AnalyticsResult;
use analytics_infrastructure::cache::LayeredCacheService;

/// 预计算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputeConfig {
    /// 表现数据回看窗口（天）
    pub lookback_days: i64,
    /// 趋势计算回看窗口（天）
    pub trends_lookback_days: i64,
    /// 批量处理的分片大小
    pub batch_size: usize,
    /// 分片之间的延迟（毫秒），避免压垮下游依赖
    pub batch_delay_ms: u64,
}

impl Default for PrecomputeConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            trends_lookback_days: 90,
            batch_size: 10,
            batch_delay_ms: 1000,
        }
    }
}

/// 预计算服务，结果包的唯一写入方
pub struct AnalyticsPrecomputeService {
    performance_repo: Arc<dyn PerformanceRepository>,
    gap_analysis: Arc<dyn GapAnalysisService>,
    recommendation_service: Arc<dyn RecommendationService>,
    cache: Arc<LayeredCacheService>,
    queue: Arc<dyn TaskQueue>,
    config: PrecomputeConfig,
}

impl AnalyticsPrecomputeService {
    pub fn new(
        performance_repo: Arc<dyn PerformanceRepository>,
        gap_analysis: Arc<dyn GapAnalysisService>,
        recommendation_service: Arc<dyn RecommendationService>,
        cache: Arc<LayeredCacheService>,
        queue: Arc<dyn TaskQueue>,
        config: PrecomputeConfig,
    ) -> Self {
        Self {
            performance_repo,
            gap_analysis,
            recommendation_service,
            cache,
            queue,
            config,
        }
    }

    /// 为单个用户预计算分析数据并写入缓存
    ///
    /// 任何步骤失败都在此处兜底：记录错误并返回空结果包，
    /// 绝不让单用户的失败中断批处理或worker循环。
    pub async fn precompute_user_analytics(&self, user_id: &str) -> PrecomputedBundle {
        match self.compute_and_cache(user_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!("用户 {} 分析预计算失败: {}", user_id, e);
                PrecomputedBundle::empty(user_id, self.bundle_ttl().as_secs() as i64)
            }
        }
    }

    /// 计算结果包并缓存；错误向批处理调用方传播
    pub async fn compute_and_cache(&self, user_id: &str) -> AnalyticsResult<PrecomputedBundle> {
        info!("开始为用户 {} 预计算分析数据", user_id);
        let bundle = self.compute_bundle(user_id).await?;

        // 缓存写入失败不影响计算结果
        if !self.cache.cache_precomputed_bundle(&bundle).await {
            warn!("用户 {} 的预计算结果缓存写入失败", user_id);
        }

        info!("用户 {} 分析预计算完成", user_id);
        Ok(bundle)
    }

    /// 预计算流水线：表现数据 → 差距 → 推荐 → 趋势 → 结果包
    async fn compute_bundle(&self, user_id: &str) -> AnalyticsResult<PrecomputedBundle> {
        let now = Utc::now();
        let since = now - chrono::Duration::days(self.config.lookback_days);

        // 1. 最近表现数据
        let records = self
            .performance_repo
            .fetch_recent_performance(user_id, since)
            .await?;
        let performance_summary = PerformanceSummary::from_records(&records);

        // 2. 有表现数据时才做差距分析，按严重度排名
        let learning_gaps = if records.is_empty() {
            GapSummary::default()
        } else {
            let gaps = self.gap_analysis.compute_learning_gaps(user_id).await?;
            GapSummary::from_gaps(gaps)
        };

        // 3. 检出差距时才生成推荐，按优先级分数排名
        let recommendations = if learning_gaps.gaps.is_empty() {
            RecommendationSummary::default()
        } else {
            let recs = self
                .recommendation_service
                .compute_recommendations(user_id)
                .await?;
            RecommendationSummary::from_recommendations(recs)
        };

        // 4. 进度趋势（90天按周聚合）
        let trend_since = now - chrono::Duration::days(self.config.trends_lookback_days);
        let trend_records = self
            .performance_repo
            .fetch_recent_performance(user_id, trend_since)
            .await?;
        let progress_trends = ProgressTrends::from_weekly(group_by_week(&trend_records));

        debug!(
            "用户 {} 预计算: {} 条记录, {} 个差距, {} 条推荐, 趋势 {}",
            user_id,
            records.len(),
            learning_gaps.total_gaps,
            recommendations.active_recommendations,
            progress_trends.trend_direction.as_str()
        );

        Ok(PrecomputedBundle {
            user_id: user_id.to_string(),
            performance_summary,
            learning_gaps,
            recommendations,
            progress_trends,
            computed_at: now,
            cache_expires_at: now + chrono::Duration::from_std(self.bundle_ttl()).unwrap_or_default(),
        })
    }

    /// 批量预计算：固定大小分片，分片内并发，分片间短暂延迟
    ///
    /// 单个用户的失败只记入failed列表，不中断整个批次。
    pub async fn batch_precompute(&self, user_ids: &[String]) -> analytics_domain::entities::BatchPrecomputeResult {
        let mut result = analytics_domain::entities::BatchPrecomputeResult {
            total_processed: user_ids.len(),
            ..Default::default()
        };

        let chunks: Vec<&[String]> = user_ids.chunks(self.config.batch_size).collect();
        let chunk_count = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let outcomes = futures::future::join_all(
                chunk
                    .iter()
                    .map(|user_id| async move { (user_id, self.compute_and_cache(user_id).await) }),
            )
            .await;

            for (user_id, outcome) in outcomes {
                match outcome {
                    Ok(_) => result.successful.push(user_id.clone()),
                    Err(e) => result.failed.push(analytics_domain::entities::FailedPrecompute {
                        user_id: user_id.clone(),
                        error: e.to_string(),
                    }),
                }
            }

            // 分片之间稍作停顿，避免压垮下游
            if index + 1 < chunk_count && self.config.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        info!(
            "批量预计算完成: {} 成功, {} 失败",
            result.successful.len(),
            result.failed.len()
        );
        result
    }

    /// 为单个用户预热缓存
    ///
    /// 只计算一次结果包，再从中派生写入各子缓存（用户分析、看板、
    /// 差距、推荐），避免重复计算。
    pub async fn warm_cache_for_user(&self, user_id: &str) -> bool {
        let bundle = match self.compute_and_cache(user_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!("为用户 {} 预热缓存失败: {}", user_id, e);
                return false;
            }
        };

        if bundle.is_empty() {
            debug!("用户 {} 无分析数据，跳过缓存预热", user_id);
            return false;
        }

        self.cache
            .set(
                user_id,
                &bundle,
                analytics_infrastructure::cache::CacheType::UserAnalytics,
                None,
            )
            .await;
        self.cache
            .cache_dashboard_data(user_id, &DashboardData::from_bundle(&bundle))
            .await;
        if !bundle.learning_gaps.gaps.is_empty() {
            self.cache
                .cache_learning_gaps(user_id, &bundle.learning_gaps)
                .await;
        }
        if !bundle.recommendations.recommendations.is_empty() {
            self.cache
                .cache_recommendations(user_id, &bundle.recommendations)
                .await;
        }

        info!("用户 {} 缓存预热完成", user_id);
        true
    }

    /// 调度一次预计算（enqueue不等待；延迟为0时立即非阻塞入队）
    pub fn schedule_precompute(&self, user_id: &str, delay: Duration, scheduled_by: &str) {
        let queue = self.queue.clone();
        let task = Task::analytics_precompute(user_id, scheduled_by);
        let queue_kind = task.task_type.queue();
        let user_id = user_id.to_string();

        if delay.is_zero() {
            let task_id = task.id;
            tokio::spawn(async move {
                if !queue.enqueue(queue_kind, task).await {
                    warn!("用户 {} 的预计算任务 {} 因队列已满被丢弃", user_id, task_id);
                }
            });
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let task_id = task.id;
                if !queue.enqueue(queue_kind, task).await {
                    warn!("用户 {} 的预计算任务 {} 因队列已满被丢弃", user_id, task_id);
                }
            });
        }
    }

    fn bundle_ttl(&self) -> Duration {
        self.cache.ttl().precomputed
    }
}

/// 按ISO周起始日（周一）聚合表现记录
fn group_by_week(records: &[PerformanceRecord]) -> Vec<WeeklyProgress> {
    let mut weeks: BTreeMap<chrono::NaiveDate, Vec<&PerformanceRecord>> = BTreeMap::new();
    for record in records {
        let date = record.timestamp.date_naive();
        let week_start =
            date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
        weeks.entry(week_start).or_default().push(record);
    }

    weeks
        .into_iter()
        .map(|(week_start, records)| {
            let count = records.len();
            let avg_score = records.iter().map(|r| r.score).sum::<f64>() / count as f64;
            let performance_percentage =
                records.iter().map(|r| r.percentage()).sum::<f64>() / count as f64;
            WeeklyProgress {
                week_start: week_start.and_time(chrono::NaiveTime::MIN).and_utc(),
                avg_score,
                submission_count: count,
                performance_percentage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_domain::entities::{QueueKind, TrendDirection};
    use analytics_infrastructure::cache::{
        CacheManager, CacheTtl, LayeredCacheService, MemoryCacheStore,
    };
    use analytics_infrastructure::queue::{QueueConfig, TaskQueueManager};
    use analytics_testing_utils::{
        learning_gap, performance_record, recommendation, MockGapAnalysisService,
        MockPerformanceRepository, MockRecommendationService,
    };

    struct Fixture {
        service: AnalyticsPrecomputeService,
        performance: MockPerformanceRepository,
        gaps: MockGapAnalysisService,
        recommendations: MockRecommendationService,
        cache: Arc<LayeredCacheService>,
        queue: Arc<TaskQueueManager>,
    }

    fn fixture() -> Fixture {
        let performance = MockPerformanceRepository::new();
        let gaps = MockGapAnalysisService::new();
        let recommendations = MockRecommendationService::new();
        let cache = Arc::new(LayeredCacheService::new(
            CacheManager::new(Arc::new(MemoryCacheStore::new()), Duration::from_secs(3600)),
            CacheTtl::default(),
        ));
        let queue = Arc::new(TaskQueueManager::new(QueueConfig::default()));

        let service = AnalyticsPrecomputeService::new(
            Arc::new(performance.clone()),
            Arc::new(gaps.clone()),
            Arc::new(recommendations.clone()),
            cache.clone(),
            queue.clone(),
            PrecomputeConfig {
                batch_delay_ms: 0,
                ..Default::default()
            },
        );

        Fixture {
            service,
            performance,
            gaps,
            recommendations,
            cache,
            queue,
        }
    }

    #[tokio::test]
    async fn test_precompute_full_pipeline() {
        let f = fixture();
        f.performance
            .add_record(performance_record("u1", 4.0, 10.0, 2));
        f.performance
            .add_record(performance_record("u1", 5.0, 10.0, 3));
        f.gaps.set_gaps(
            "u1",
            vec![learning_gap("math.algebra", 0.9), learning_gap("math.geometry", 0.4)],
        );
        f.recommendations.set_recommendations(
            "u1",
            vec![
                recommendation("r1", 0.95, false),
                recommendation("r2", 0.3, true),
            ],
        );

        let bundle = f.service.precompute_user_analytics("u1").await;

        assert_eq!(bundle.user_id, "u1");
        assert_eq!(bundle.performance_summary.total_submissions, 2);
        assert_eq!(bundle.learning_gaps.total_gaps, 2);
        assert_eq!(bundle.learning_gaps.high_priority_gaps, 1);
        assert_eq!(bundle.recommendations.active_recommendations, 1);
        assert!(bundle.cache_expires_at > bundle.computed_at);

        // 结果包已写入缓存
        let cached = f.cache.get_precomputed_bundle("u1").await.unwrap();
        assert_eq!(cached.learning_gaps.total_gaps, 2);
    }

    #[tokio::test]
    async fn test_precompute_without_performance_skips_computation() {
        let f = fixture();

        let bundle = f.service.precompute_user_analytics("u1").await;

        assert!(bundle.is_empty());
        // 无表现数据时不调用差距分析与推荐
        assert_eq!(f.gaps.compute_call_count(), 0);
        assert_eq!(f.recommendations.compute_call_count(), 0);
    }

    #[tokio::test]
    async fn test_precompute_without_gaps_skips_recommendations() {
        let f = fixture();
        f.performance
            .add_record(performance_record("u1", 9.0, 10.0, 1));
        f.gaps.set_gaps("u1", vec![]);

        let bundle = f.service.precompute_user_analytics("u1").await;

        assert_eq!(bundle.learning_gaps.total_gaps, 0);
        assert_eq!(f.gaps.compute_call_count(), 1);
        assert_eq!(f.recommendations.compute_call_count(), 0);
    }

    #[tokio::test]
    async fn test_precompute_failure_degrades_to_empty_bundle() {
        let f = fixture();
        f.performance.set_failing(true);

        let bundle = f.service.precompute_user_analytics("u1").await;

        assert!(bundle.is_empty());
        assert_eq!(bundle.user_id, "u1");
        // 失败路径不写缓存
        assert!(f.cache.get_precomputed_bundle("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let f = fixture();
        for user in ["u1", "u2", "u3"] {
            f.performance
                .add_record(performance_record(user, 5.0, 10.0, 1));
        }
        f.gaps.set_gaps("u1", vec![]);
        f.gaps.fail_for("u2");
        f.gaps.set_gaps("u3", vec![]);

        let result = f
            .service
            .batch_precompute(&["u1".to_string(), "u2".to_string(), "u3".to_string()])
            .await;

        assert_eq!(result.total_processed, 3);
        assert_eq!(result.successful, vec!["u1".to_string(), "u3".to_string()]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].user_id, "u2");
    }

    #[tokio::test]
    async fn test_warm_cache_writes_all_subcaches() {
        let f = fixture();
        f.performance
            .add_record(performance_record("u1", 4.0, 10.0, 1));
        f.gaps.set_gaps("u1", vec![learning_gap("math.algebra", 0.8)]);
        f.recommendations
            .set_recommendations("u1", vec![recommendation("r1", 0.9, false)]);

        assert!(f.service.warm_cache_for_user("u1").await);

        assert!(f.cache.get_precomputed_bundle("u1").await.is_some());
        assert!(f.cache.get_dashboard_data("u1").await.is_some());
        assert!(f.cache.get_learning_gaps("u1").await.is_some());
        assert!(f.cache.get_recommendations("u1").await.is_some());
        // 预热只触发一次差距计算
        assert_eq!(f.gaps.compute_call_count(), 1);
    }

    #[tokio::test]
    async fn test_warm_cache_without_data_reports_false() {
        let f = fixture();
        assert!(!f.service.warm_cache_for_user("u1").await);
    }

    #[tokio::test]
    async fn test_schedule_precompute_enqueues_task() {
        let f = fixture();
        f.service.schedule_precompute("u1", Duration::ZERO, "test");

        let task = f
            .queue
            .dequeue(QueueKind::Analytics, Duration::from_millis(200))
            .await
            .expect("task should be enqueued");
        assert_eq!(task.user_id(), Some("u1"));
    }

    #[tokio::test]
    async fn test_trend_direction_from_weekly_groups() {
        let f = fixture();
        // 前几周低分，近几周高分：应判定为上升
        for week in 0..6 {
            let score = if week < 3 { 9.0 } else { 4.0 };
            for day in 0..2 {
                f.performance.add_record(performance_record(
                    "u1",
                    score,
                    10.0,
                    (week * 7 + day) as i64,
                ));
            }
        }

        let bundle = f.service.precompute_user_analytics("u1").await;
        assert_eq!(
            bundle.progress_trends.trend_direction,
            TrendDirection::Improving
        );
        assert!(bundle.progress_trends.total_weeks_active >= 5);
    }
}
