//! 嵌入式内存数据适配器
//!
//! 为仓储与算法端口提供零配置的内存实现，用于嵌入式部署与测试。
//! 真实的文档存储与算法服务是外部协作方，不在本系统范围内。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use analytics_domain::entities::{
    LearningGap, ModelMetrics, PerformanceRecord, Recommendation,
};
use analytics_domain::repositories::{
    GapRepository, PerformanceRepository, RecommendationRepository,
};
use analytics_domain::services::{GapAnalysisService, RecommendationService};
use analytics_errors::AnalyticsResult;

/// 内存表现数据仓储
#[derive(Debug, Clone, Default)]
pub struct MemoryPerformanceRepository {
    records: Arc<RwLock<Vec<PerformanceRecord>>>,
    logins: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl MemoryPerformanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一条表现记录（测试/演示数据）
    pub async fn add_record(&self, record: PerformanceRecord) {
        self.records.write().await.push(record);
    }

    /// 记录用户登录时间
    pub async fn record_login(&self, user_id: &str, at: DateTime<Utc>) {
        self.logins.write().await.insert(user_id.to_string(), at);
    }
}

#[async_trait]
impl PerformanceRepository for MemoryPerformanceRepository {
    async fn fetch_recent_performance(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn recently_active_users(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AnalyticsResult<Vec<String>> {
        let logins = self.logins.read().await;
        let mut users: Vec<(String, DateTime<Utc>)> = logins
            .iter()
            .filter(|(_, at)| **at >= since)
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        // 最近登录的在前
        users.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(users.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    async fn training_records(&self, limit: usize) -> AnalyticsResult<Vec<PerformanceRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().take(limit).cloned().collect())
    }
}

/// 内存差距仓储
#[derive(Debug, Clone, Default)]
pub struct MemoryGapRepository {
    gaps: Arc<RwLock<HashMap<String, Vec<LearningGap>>>>,
}

impl MemoryGapRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_gaps(&self, user_id: &str, gaps: Vec<LearningGap>) {
        self.gaps.write().await.insert(user_id.to_string(), gaps);
    }
}

#[async_trait]
impl GapRepository for MemoryGapRepository {
    async fn significant_gaps(
        &self,
        user_id: &str,
        min_severity: f64,
        limit: usize,
    ) -> AnalyticsResult<Vec<LearningGap>> {
        let gaps = self.gaps.read().await;
        let mut result: Vec<LearningGap> = gaps
            .get(user_id)
            .map(|g| {
                g.iter()
                    .filter(|gap| gap.gap_severity >= min_severity)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by(|a, b| {
            b.gap_severity
                .partial_cmp(&a.gap_severity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result.truncate(limit);
        Ok(result)
    }
}

/// 内存推荐仓储
#[derive(Debug, Clone, Default)]
pub struct MemoryRecommendationRepository {
    recommendations: Arc<RwLock<HashMap<String, Vec<Recommendation>>>>,
}

impl MemoryRecommendationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_recommendations(&self, user_id: &str, recs: Vec<Recommendation>) {
        self.recommendations
            .write()
            .await
            .insert(user_id.to_string(), recs);
    }
}

#[async_trait]
impl RecommendationRepository for MemoryRecommendationRepository {
    async fn active_recommendations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> AnalyticsResult<Vec<Recommendation>> {
        let recommendations = self.recommendations.read().await;
        let mut result: Vec<Recommendation> = recommendations
            .get(user_id)
            .map(|r| r.iter().filter(|rec| !rec.completed).cloned().collect())
            .unwrap_or_default();
        result.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result.truncate(limit);
        Ok(result)
    }
}

/// 启发式差距分析适配器
///
/// 外部差距检测算法的嵌入式替身：按提交类型聚合近30天的得分率，
/// 低于及格线即视为差距，严重度与得分率成反比。
pub struct HeuristicGapAnalysis {
    performance: Arc<dyn PerformanceRepository>,
    /// 及格线（百分比）
    passing_percentage: f64,
}

impl HeuristicGapAnalysis {
    pub fn new(performance: Arc<dyn PerformanceRepository>) -> Self {
        Self {
            performance,
            passing_percentage: 70.0,
        }
    }
}

#[async_trait]
impl GapAnalysisService for HeuristicGapAnalysis {
    async fn compute_learning_gaps(&self, user_id: &str) -> AnalyticsResult<Vec<LearningGap>> {
        let since = Utc::now() - Duration::days(30);
        let records = self
            .performance
            .fetch_recent_performance(user_id, since)
            .await?;

        let mut by_type: HashMap<String, Vec<f64>> = HashMap::new();
        for record in &records {
            by_type
                .entry(record.submission_type.clone())
                .or_default()
                .push(record.percentage());
        }

        let now = Utc::now();
        let mut gaps = Vec::new();
        for (submission_type, percentages) in by_type {
            let avg = percentages.iter().sum::<f64>() / percentages.len() as f64;
            if avg < self.passing_percentage {
                gaps.push(LearningGap {
                    concept_id: format!("general.{submission_type}"),
                    gap_severity: (1.0 - avg / 100.0).clamp(0.0, 1.0),
                    detected_at: now,
                });
            }
        }

        debug!("Detected {} gaps for user {}", gaps.len(), user_id);
        Ok(gaps)
    }

    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics> {
        info!(
            "Training gap detection model with {} samples",
            records.len()
        );
        Ok(ModelMetrics {
            accuracy: 0.85,
            precision: 0.82,
            recall: 0.88,
            training_samples: records.len(),
            trained_at: Utc::now(),
        })
    }
}

/// 启发式推荐适配器
///
/// 外部推荐算法的嵌入式替身：每个检测到的差距对应一条练习资源推荐，
/// 优先级分数取差距严重度。
pub struct HeuristicRecommendationService {
    gap_analysis: Arc<dyn GapAnalysisService>,
}

impl HeuristicRecommendationService {
    pub fn new(gap_analysis: Arc<dyn GapAnalysisService>) -> Self {
        Self { gap_analysis }
    }
}

#[async_trait]
impl RecommendationService for HeuristicRecommendationService {
    async fn compute_recommendations(
        &self,
        user_id: &str,
    ) -> AnalyticsResult<Vec<Recommendation>> {
        let gaps = self.gap_analysis.compute_learning_gaps(user_id).await?;

        let recommendations = gaps
            .into_iter()
            .map(|gap| Recommendation {
                resource_id: format!("practice:{}", gap.concept_id),
                resource_type: "practice".to_string(),
                concept_id: Some(gap.concept_id),
                priority_score: gap.gap_severity.clamp(0.0, 1.0),
                completed: false,
            })
            .collect();

        Ok(recommendations)
    }

    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics> {
        info!(
            "Training recommendation model with {} samples",
            records.len()
        );
        Ok(ModelMetrics {
            accuracy: 0.80,
            precision: 0.78,
            recall: 0.83,
            training_samples: records.len(),
            trained_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, score: f64, submission_type: &str, days_ago: i64) -> PerformanceRecord {
        PerformanceRecord {
            user_id: user_id.to_string(),
            score,
            max_score: 10.0,
            submission_type: submission_type.to_string(),
            timestamp: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn test_fetch_recent_performance_filters_window() {
        let repo = MemoryPerformanceRepository::new();
        repo.add_record(record("u1", 8.0, "quiz", 5)).await;
        repo.add_record(record("u1", 6.0, "quiz", 40)).await;
        repo.add_record(record("u2", 7.0, "quiz", 5)).await;

        let since = Utc::now() - Duration::days(30);
        let records = repo.fetch_recent_performance("u1", since).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 8.0);
    }

    #[tokio::test]
    async fn test_recently_active_users_sorted_and_capped() {
        let repo = MemoryPerformanceRepository::new();
        repo.record_login("old", Utc::now() - Duration::days(3)).await;
        repo.record_login("recent", Utc::now()).await;
        repo.record_login("yesterday", Utc::now() - Duration::hours(20))
            .await;

        let since = Utc::now() - Duration::hours(24);
        let users = repo.recently_active_users(since, 10).await.unwrap();
        assert_eq!(users, vec!["recent".to_string(), "yesterday".to_string()]);

        let capped = repo.recently_active_users(since, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_heuristic_gap_analysis_detects_weak_areas() {
        let repo = Arc::new(MemoryPerformanceRepository::new());
        // quiz平均40%：差距；exercise平均90%：无差距
        repo.add_record(record("u1", 4.0, "quiz", 1)).await;
        repo.add_record(record("u1", 4.0, "quiz", 2)).await;
        repo.add_record(record("u1", 9.0, "exercise", 1)).await;

        let analysis = HeuristicGapAnalysis::new(repo);
        let gaps = analysis.compute_learning_gaps("u1").await.unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].concept_id, "general.quiz");
        assert!((gaps[0].gap_severity - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_heuristic_recommendations_follow_gaps() {
        let repo = Arc::new(MemoryPerformanceRepository::new());
        repo.add_record(record("u1", 3.0, "quiz", 1)).await;

        let gap_analysis: Arc<dyn GapAnalysisService> =
            Arc::new(HeuristicGapAnalysis::new(repo));
        let service = HeuristicRecommendationService::new(gap_analysis);

        let recs = service.compute_recommendations("u1").await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].resource_type, "practice");
        assert!(!recs[0].completed);
        assert!(recs[0].priority_score > 0.5);
    }

    #[tokio::test]
    async fn test_significant_gaps_filter_and_order() {
        let repo = MemoryGapRepository::new();
        let now = Utc::now();
        repo.insert_gaps(
            "u1",
            vec![
                LearningGap {
                    concept_id: "a".to_string(),
                    gap_severity: 0.3,
                    detected_at: now,
                },
                LearningGap {
                    concept_id: "b".to_string(),
                    gap_severity: 0.9,
                    detected_at: now,
                },
                LearningGap {
                    concept_id: "c".to_string(),
                    gap_severity: 0.6,
                    detected_at: now,
                },
            ],
        )
        .await;

        let gaps = repo.significant_gaps("u1", 0.5, 5).await.unwrap();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].concept_id, "b");
    }
}
