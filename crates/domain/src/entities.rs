use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 学习差距排名保留数量
pub const MAX_TOP_GAPS: usize = 10;
/// 推荐排名保留数量
pub const MAX_TOP_RECOMMENDATIONS: usize = 5;
/// 高优先级差距的严重度阈值
pub const HIGH_SEVERITY_THRESHOLD: f64 = 0.7;
/// 高优先级推荐的分数阈值
pub const HIGH_PRIORITY_SCORE: f64 = 0.8;
/// 趋势判定阈值（百分点）
pub const TREND_THRESHOLD: f64 = 5.0;

/// 任务队列类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    #[serde(rename = "ml_training")]
    MlTraining,
    #[serde(rename = "analytics")]
    Analytics,
    #[serde(rename = "cache_refresh")]
    CacheRefresh,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::MlTraining => "ml_training",
            QueueKind::Analytics => "analytics",
            QueueKind::CacheRefresh => "cache_refresh",
        }
    }

    /// 所有队列类型（用于遍历启动消费者）
    pub fn all() -> [QueueKind; 3] {
        [
            QueueKind::MlTraining,
            QueueKind::Analytics,
            QueueKind::CacheRefresh,
        ]
    }
}

/// 任务优先级，仅作为附加元数据，不影响FIFO出队顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskPriority {
    #[serde(rename = "low")]
    Low,
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "high")]
    High,
}

/// 任务类型（封闭枚举，按编译期处理器表分发）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "gap_detection_training")]
    GapDetectionTraining,
    #[serde(rename = "recommendation_training")]
    RecommendationTraining,
    #[serde(rename = "concept_mapping_training")]
    ConceptMappingTraining,
    #[serde(rename = "user_analytics_precompute")]
    UserAnalyticsPrecompute,
    #[serde(rename = "gap_analysis_update")]
    GapAnalysisUpdate,
    #[serde(rename = "recommendation_generation")]
    RecommendationGeneration,
    #[serde(rename = "batch_analytics_update")]
    BatchAnalyticsUpdate,
    #[serde(rename = "dashboard_refresh")]
    DashboardRefresh,
    #[serde(rename = "user_analytics_refresh")]
    UserAnalyticsRefresh,
    #[serde(rename = "recommendations_refresh")]
    RecommendationsRefresh,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::GapDetectionTraining => "gap_detection_training",
            TaskType::RecommendationTraining => "recommendation_training",
            TaskType::ConceptMappingTraining => "concept_mapping_training",
            TaskType::UserAnalyticsPrecompute => "user_analytics_precompute",
            TaskType::GapAnalysisUpdate => "gap_analysis_update",
            TaskType::RecommendationGeneration => "recommendation_generation",
            TaskType::BatchAnalyticsUpdate => "batch_analytics_update",
            TaskType::DashboardRefresh => "dashboard_refresh",
            TaskType::UserAnalyticsRefresh => "user_analytics_refresh",
            TaskType::RecommendationsRefresh => "recommendations_refresh",
        }
    }

    /// 任务类型所属的队列
    pub fn queue(&self) -> QueueKind {
        match self {
            TaskType::GapDetectionTraining
            | TaskType::RecommendationTraining
            | TaskType::ConceptMappingTraining => QueueKind::MlTraining,
            TaskType::UserAnalyticsPrecompute
            | TaskType::GapAnalysisUpdate
            | TaskType::RecommendationGeneration
            | TaskType::BatchAnalyticsUpdate => QueueKind::Analytics,
            TaskType::DashboardRefresh
            | TaskType::UserAnalyticsRefresh
            | TaskType::RecommendationsRefresh => QueueKind::CacheRefresh,
        }
    }
}

/// 后台任务，入队后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    pub priority: TaskPriority,
    pub scheduled_by: String,
    pub scheduled_at: DateTime<Utc>,
}

impl Task {
    pub fn new(task_type: TaskType, payload: serde_json::Value, scheduled_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            payload,
            priority: TaskPriority::Normal,
            scheduled_by: scheduled_by.to_string(),
            scheduled_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// 单用户分析预计算任务
    pub fn analytics_precompute(user_id: &str, scheduled_by: &str) -> Self {
        Self::new(
            TaskType::UserAnalyticsPrecompute,
            serde_json::json!({ "user_id": user_id }),
            scheduled_by,
        )
    }

    /// 差距分析更新任务
    pub fn gap_analysis_update(user_id: &str, scheduled_by: &str) -> Self {
        Self::new(
            TaskType::GapAnalysisUpdate,
            serde_json::json!({ "user_id": user_id }),
            scheduled_by,
        )
    }

    /// 推荐生成任务
    pub fn recommendation_generation(user_id: &str, scheduled_by: &str) -> Self {
        Self::new(
            TaskType::RecommendationGeneration,
            serde_json::json!({ "user_id": user_id }),
            scheduled_by,
        )
    }

    /// 批量分析更新任务
    pub fn batch_analytics_update(user_ids: &[String], scheduled_by: &str) -> Self {
        Self::new(
            TaskType::BatchAnalyticsUpdate,
            serde_json::json!({ "user_ids": user_ids }),
            scheduled_by,
        )
    }

    /// ML模型训练任务
    pub fn ml_training(task_type: TaskType, scheduled_by: &str) -> Self {
        debug_assert_eq!(task_type.queue(), QueueKind::MlTraining);
        Self::new(task_type, serde_json::json!({}), scheduled_by)
    }

    /// 缓存刷新任务
    pub fn cache_refresh(task_type: TaskType, scope: &str, scheduled_by: &str) -> Self {
        debug_assert_eq!(task_type.queue(), QueueKind::CacheRefresh);
        Self::new(
            task_type,
            serde_json::json!({ "scope": scope }),
            scheduled_by,
        )
    }

    /// 从payload中取user_id
    pub fn user_id(&self) -> Option<&str> {
        self.payload.get("user_id").and_then(|v| v.as_str())
    }

    /// 从payload中取user_ids列表
    pub fn user_ids(&self) -> Vec<String> {
        self.payload
            .get("user_ids")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 单条学习表现记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub user_id: String,
    pub score: f64,
    pub max_score: f64,
    pub submission_type: String,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceRecord {
    /// 得分百分比，max_score为0时记为0
    pub fn percentage(&self) -> f64 {
        if self.max_score > 0.0 {
            self.score / self.max_score * 100.0
        } else {
            0.0
        }
    }
}

/// 学习表现汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_submissions: usize,
    pub avg_score: f64,
    pub max_score_possible: f64,
    pub performance_percentage: f64,
    pub recent_activity: Vec<PerformanceRecord>,
}

impl PerformanceSummary {
    /// 从最近的表现记录汇总（保留按时间倒序的前5条活动）
    pub fn from_records(records: &[PerformanceRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let total = records.len();
        let avg_score = records.iter().map(|r| r.score).sum::<f64>() / total as f64;
        let max_score_possible = records.iter().map(|r| r.max_score).sum::<f64>() / total as f64;
        let performance_percentage = if max_score_possible > 0.0 {
            avg_score / max_score_possible * 100.0
        } else {
            0.0
        };

        let mut recent: Vec<PerformanceRecord> = records.to_vec();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(5);

        Self {
            total_submissions: total,
            avg_score,
            max_score_possible,
            performance_percentage,
            recent_activity: recent,
        }
    }
}

/// 学习差距
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningGap {
    pub concept_id: String,
    pub gap_severity: f64,
    pub detected_at: DateTime<Utc>,
}

impl LearningGap {
    /// 概念所属类别（concept_id形如 "math.algebra.linear_equations"）
    pub fn category(&self) -> &str {
        self.concept_id.split('.').next().unwrap_or("unknown")
    }
}

/// 差距分析汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapSummary {
    pub total_gaps: usize,
    pub high_priority_gaps: usize,
    pub gaps: Vec<LearningGap>,
    pub gap_categories: HashMap<String, usize>,
}

impl GapSummary {
    /// 按严重度降序排名，保留前10条
    pub fn from_gaps(mut gaps: Vec<LearningGap>) -> Self {
        let total_gaps = gaps.len();
        let high_priority_gaps = gaps
            .iter()
            .filter(|g| g.gap_severity > HIGH_SEVERITY_THRESHOLD)
            .count();
        let mut gap_categories: HashMap<String, usize> = HashMap::new();
        for gap in &gaps {
            *gap_categories.entry(gap.category().to_string()).or_insert(0) += 1;
        }
        gaps.sort_by(|a, b| {
            b.gap_severity
                .partial_cmp(&a.gap_severity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        gaps.truncate(MAX_TOP_GAPS);

        Self {
            total_gaps,
            high_priority_gaps,
            gaps,
            gap_categories,
        }
    }
}

/// 学习资源推荐
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub resource_id: String,
    pub resource_type: String,
    pub concept_id: Option<String>,
    pub priority_score: f64,
    pub completed: bool,
}

/// 推荐汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub total_recommendations: usize,
    pub active_recommendations: usize,
    pub high_priority_recommendations: usize,
    pub recommendations: Vec<Recommendation>,
    pub recommendation_types: HashMap<String, usize>,
}

impl RecommendationSummary {
    /// 过滤未完成的推荐，按优先级分数降序保留前5条
    pub fn from_recommendations(recommendations: Vec<Recommendation>) -> Self {
        let total_recommendations = recommendations.len();
        let mut active: Vec<Recommendation> = recommendations
            .into_iter()
            .filter(|r| !r.completed)
            .collect();
        let active_recommendations = active.len();
        let high_priority_recommendations = active
            .iter()
            .filter(|r| r.priority_score > HIGH_PRIORITY_SCORE)
            .count();
        let mut recommendation_types: HashMap<String, usize> = HashMap::new();
        for rec in &active {
            *recommendation_types
                .entry(rec.resource_type.clone())
                .or_insert(0) += 1;
        }
        active.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        active.truncate(MAX_TOP_RECOMMENDATIONS);

        Self {
            total_recommendations,
            active_recommendations,
            high_priority_recommendations,
            recommendations: active,
            recommendation_types,
        }
    }
}

/// 每周学习进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyProgress {
    pub week_start: DateTime<Utc>,
    pub avg_score: f64,
    pub submission_count: usize,
    pub performance_percentage: f64,
}

/// 进度趋势方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrendDirection {
    #[serde(rename = "improving")]
    Improving,
    #[serde(rename = "declining")]
    Declining,
    #[default]
    #[serde(rename = "stable")]
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

/// 进度趋势汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressTrends {
    pub trend_direction: TrendDirection,
    pub weekly_data: Vec<WeeklyProgress>,
    pub total_weeks_active: usize,
    pub current_streak: usize,
}

impl ProgressTrends {
    /// 从按周聚合的数据计算趋势：近3周均值与前3周均值相差超过阈值判定上升/下降
    pub fn from_weekly(weekly_data: Vec<WeeklyProgress>) -> Self {
        let mut trend_direction = TrendDirection::Stable;
        if weekly_data.len() >= 2 {
            let window = weekly_data.len().min(3);
            let recent_avg = weekly_data[weekly_data.len() - window..]
                .iter()
                .map(|w| w.performance_percentage)
                .sum::<f64>()
                / window as f64;
            let earlier_avg = weekly_data[..window]
                .iter()
                .map(|w| w.performance_percentage)
                .sum::<f64>()
                / window as f64;

            if recent_avg > earlier_avg + TREND_THRESHOLD {
                trend_direction = TrendDirection::Improving;
            } else if recent_avg < earlier_avg - TREND_THRESHOLD {
                trend_direction = TrendDirection::Declining;
            }
        }

        let current_streak = weekly_data
            .iter()
            .rev()
            .take_while(|w| w.submission_count > 0)
            .count();

        Self {
            trend_direction,
            total_weeks_active: weekly_data.len(),
            current_streak,
            weekly_data,
        }
    }
}

/// 单用户的预计算分析结果，由预计算服务独占写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputedBundle {
    pub user_id: String,
    pub performance_summary: PerformanceSummary,
    pub learning_gaps: GapSummary,
    pub recommendations: RecommendationSummary,
    pub progress_trends: ProgressTrends,
    pub computed_at: DateTime<Utc>,
    pub cache_expires_at: DateTime<Utc>,
}

impl PrecomputedBundle {
    /// 空结果（计算失败时的降级值）
    pub fn empty(user_id: &str, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            performance_summary: PerformanceSummary::default(),
            learning_gaps: GapSummary::default(),
            recommendations: RecommendationSummary::default(),
            progress_trends: ProgressTrends::default(),
            computed_at: now,
            cache_expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.performance_summary.total_submissions == 0
            && self.learning_gaps.total_gaps == 0
            && self.recommendations.total_recommendations == 0
    }
}

/// 看板数据来源标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "precomputed")]
    Precomputed,
    #[serde(rename = "cached")]
    Cached,
    #[serde(rename = "realtime")]
    Realtime,
    #[serde(rename = "error")]
    Error,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Precomputed => "precomputed",
            DataSource::Cached => "cached",
            DataSource::Realtime => "realtime",
            DataSource::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceOverview {
    pub recent_activity_count: usize,
    pub avg_recent_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapOverview {
    pub total_gaps: usize,
    pub high_priority_gaps: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationOverview {
    pub active_recommendations: usize,
    pub high_priority_recommendations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendOverview {
    pub trend_direction: TrendDirection,
    pub recent_activity: Vec<PerformanceRecord>,
}

/// 读路径返回的看板数据（精简形态，带来源标记）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub source: DataSource,
    pub computed_at: DateTime<Utc>,
    pub performance_summary: PerformanceOverview,
    pub learning_gaps: GapOverview,
    pub recommendations: RecommendationOverview,
    pub progress_trends: TrendOverview,
}

impl DashboardData {
    /// 从预计算结果投影
    pub fn from_bundle(bundle: &PrecomputedBundle) -> Self {
        Self {
            source: DataSource::Precomputed,
            computed_at: bundle.computed_at,
            performance_summary: PerformanceOverview {
                recent_activity_count: bundle.performance_summary.recent_activity.len(),
                avg_recent_score: bundle.performance_summary.avg_score,
            },
            learning_gaps: GapOverview {
                total_gaps: bundle.learning_gaps.total_gaps,
                high_priority_gaps: bundle.learning_gaps.high_priority_gaps,
            },
            recommendations: RecommendationOverview {
                active_recommendations: bundle.recommendations.active_recommendations,
                high_priority_recommendations: bundle
                    .recommendations
                    .high_priority_recommendations,
            },
            progress_trends: TrendOverview {
                trend_direction: bundle.progress_trends.trend_direction,
                recent_activity: bundle.performance_summary.recent_activity.clone(),
            },
        }
    }

    /// 全链路失败时的兜底数据（零值，永不向调用方抛错）
    pub fn fallback() -> Self {
        Self {
            source: DataSource::Error,
            computed_at: Utc::now(),
            performance_summary: PerformanceOverview::default(),
            learning_gaps: GapOverview::default(),
            recommendations: RecommendationOverview::default(),
            progress_trends: TrendOverview::default(),
        }
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }
}

/// 进程级性能指标快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    pub average_processing_time: f64,
    pub queue_sizes: HashMap<String, usize>,
    pub last_updated: DateTime<Utc>,
}

/// ML模型训练结果指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub training_samples: usize,
    pub trained_at: DateTime<Utc>,
}

/// 批量预计算结果汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPrecomputeResult {
    pub successful: Vec<String>,
    pub failed: Vec<FailedPrecompute>,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPrecompute {
    pub user_id: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(concept_id: &str, severity: f64) -> LearningGap {
        LearningGap {
            concept_id: concept_id.to_string(),
            gap_severity: severity,
            detected_at: Utc::now(),
        }
    }

    fn week(pct: f64, count: usize) -> WeeklyProgress {
        WeeklyProgress {
            week_start: Utc::now(),
            avg_score: pct / 10.0,
            submission_count: count,
            performance_percentage: pct,
        }
    }

    #[test]
    fn test_task_type_queue_mapping() {
        assert_eq!(
            TaskType::UserAnalyticsPrecompute.queue(),
            QueueKind::Analytics
        );
        assert_eq!(
            TaskType::GapDetectionTraining.queue(),
            QueueKind::MlTraining
        );
        assert_eq!(TaskType::DashboardRefresh.queue(), QueueKind::CacheRefresh);
    }

    #[test]
    fn test_task_constructors() {
        let task = Task::analytics_precompute("user-1", "scheduler");
        assert_eq!(task.task_type, TaskType::UserAnalyticsPrecompute);
        assert_eq!(task.user_id(), Some("user-1"));
        assert_eq!(task.priority, TaskPriority::Normal);
        assert_eq!(task.scheduled_by, "scheduler");

        let batch = Task::batch_analytics_update(
            &["u1".to_string(), "u2".to_string()],
            "api",
        );
        assert_eq!(batch.user_ids(), vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(batch.user_id(), None);
    }

    #[test]
    fn test_gap_summary_ranking() {
        let gaps: Vec<LearningGap> = (0..15)
            .map(|i| gap(&format!("math.topic_{i}"), i as f64 / 15.0))
            .collect();
        let summary = GapSummary::from_gaps(gaps);

        assert_eq!(summary.total_gaps, 15);
        assert_eq!(summary.gaps.len(), MAX_TOP_GAPS);
        // 按严重度降序
        assert!(summary.gaps[0].gap_severity >= summary.gaps[1].gap_severity);
        assert_eq!(summary.gap_categories.get("math"), Some(&15));
        assert_eq!(
            summary.high_priority_gaps,
            (0..15).filter(|i| *i as f64 / 15.0 > 0.7).count()
        );
    }

    #[test]
    fn test_recommendation_summary_filters_completed() {
        let recs = vec![
            Recommendation {
                resource_id: "r1".to_string(),
                resource_type: "video".to_string(),
                concept_id: None,
                priority_score: 0.9,
                completed: false,
            },
            Recommendation {
                resource_id: "r2".to_string(),
                resource_type: "quiz".to_string(),
                concept_id: None,
                priority_score: 0.5,
                completed: true,
            },
            Recommendation {
                resource_id: "r3".to_string(),
                resource_type: "video".to_string(),
                concept_id: None,
                priority_score: 0.6,
                completed: false,
            },
        ];
        let summary = RecommendationSummary::from_recommendations(recs);
        assert_eq!(summary.total_recommendations, 3);
        assert_eq!(summary.active_recommendations, 2);
        assert_eq!(summary.high_priority_recommendations, 1);
        assert_eq!(summary.recommendations[0].resource_id, "r1");
        assert_eq!(summary.recommendation_types.get("video"), Some(&2));
    }

    #[test]
    fn test_trend_direction() {
        let improving = ProgressTrends::from_weekly(vec![
            week(50.0, 3),
            week(52.0, 2),
            week(51.0, 4),
            week(70.0, 3),
            week(72.0, 5),
            week(75.0, 2),
        ]);
        assert_eq!(improving.trend_direction, TrendDirection::Improving);

        let declining = ProgressTrends::from_weekly(vec![
            week(80.0, 3),
            week(78.0, 2),
            week(82.0, 4),
            week(60.0, 3),
            week(58.0, 5),
            week(55.0, 2),
        ]);
        assert_eq!(declining.trend_direction, TrendDirection::Declining);

        let stable = ProgressTrends::from_weekly(vec![week(60.0, 3), week(62.0, 1)]);
        assert_eq!(stable.trend_direction, TrendDirection::Stable);

        let empty = ProgressTrends::from_weekly(vec![]);
        assert_eq!(empty.trend_direction, TrendDirection::Stable);
        assert_eq!(empty.current_streak, 0);
    }

    #[test]
    fn test_activity_streak() {
        let trends = ProgressTrends::from_weekly(vec![
            week(50.0, 2),
            week(55.0, 0),
            week(60.0, 1),
            week(62.0, 3),
        ]);
        assert_eq!(trends.current_streak, 2);
    }

    #[test]
    fn test_performance_summary_from_records() {
        let now = Utc::now();
        let records: Vec<PerformanceRecord> = (0..8)
            .map(|i| PerformanceRecord {
                user_id: "u1".to_string(),
                score: 6.0,
                max_score: 10.0,
                submission_type: "quiz".to_string(),
                timestamp: now - Duration::days(i),
            })
            .collect();
        let summary = PerformanceSummary::from_records(&records);
        assert_eq!(summary.total_submissions, 8);
        assert!((summary.performance_percentage - 60.0).abs() < f64::EPSILON);
        assert_eq!(summary.recent_activity.len(), 5);
        // 最近的在前
        assert!(summary.recent_activity[0].timestamp >= summary.recent_activity[1].timestamp);
    }

    #[test]
    fn test_dashboard_projection_and_fallback() {
        let mut bundle = PrecomputedBundle::empty("u1", 1800);
        bundle.learning_gaps.total_gaps = 4;
        bundle.learning_gaps.high_priority_gaps = 2;

        let dashboard = DashboardData::from_bundle(&bundle);
        assert_eq!(dashboard.source, DataSource::Precomputed);
        assert_eq!(dashboard.learning_gaps.total_gaps, 4);

        let fallback = DashboardData::fallback();
        assert_eq!(fallback.source, DataSource::Error);
        assert_eq!(fallback.performance_summary.recent_activity_count, 0);

        let cached = dashboard.with_source(DataSource::Cached);
        assert_eq!(cached.source, DataSource::Cached);
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = PrecomputedBundle::empty("u1", 1800);
        assert!(bundle.is_empty());
        assert!(bundle.cache_expires_at > bundle.computed_at);
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = Task::ml_training(TaskType::GapDetectionTraining, "scheduler");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("gap_detection_training"));
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task_type, TaskType::GapDetectionTraining);
        assert_eq!(parsed.id, task.id);
    }
}
