//! Mock implementations for repository and service traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analytics_domain::entities::{
    LearningGap, ModelMetrics, PerformanceRecord, Recommendation,
};
use analytics_domain::repositories::PerformanceRepository;
use analytics_domain::services::{GapAnalysisService, RecommendationService};
use analytics_errors::{AnalyticsError, AnalyticsResult};
use analytics_infrastructure::cache::CacheStore;

/// Mock performance repository with failure injection and call counting
#[derive(Clone, Default)]
pub struct MockPerformanceRepository {
    records: Arc<Mutex<Vec<PerformanceRecord>>>,
    logins: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    failing: Arc<AtomicBool>,
    fetch_calls: Arc<AtomicUsize>,
}

impl MockPerformanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PerformanceRecord>) -> Self {
        let repo = Self::new();
        *repo.records.lock().unwrap() = records;
        repo
    }

    pub fn add_record(&self, record: PerformanceRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn record_login(&self, user_id: &str, at: DateTime<Utc>) {
        self.logins.lock().unwrap().insert(user_id.to_string(), at);
    }

    /// Make every repository call fail with a data-store error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> AnalyticsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AnalyticsError::DataStore("simulated failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PerformanceRepository for MockPerformanceRepository {
    async fn fetch_recent_performance(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self
            .records
            .lock()
            .unwrap()
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
        self.check_failure()?;
        let logins = self.logins.lock().unwrap();
        let mut users: Vec<(String, DateTime<Utc>)> = logins
            .iter()
            .filter(|(_, at)| **at >= since)
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        users.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(users.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    async fn training_records(&self, limit: usize) -> AnalyticsResult<Vec<PerformanceRecord>> {
        self.check_failure()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Mock gap-analysis service with per-user results and failure injection
#[derive(Clone, Default)]
pub struct MockGapAnalysisService {
    gaps: Arc<Mutex<HashMap<String, Vec<LearningGap>>>>,
    failing_users: Arc<Mutex<HashSet<String>>>,
    compute_calls: Arc<AtomicUsize>,
}

impl MockGapAnalysisService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_gaps(&self, user_id: &str, gaps: Vec<LearningGap>) {
        self.gaps.lock().unwrap().insert(user_id.to_string(), gaps);
    }

    /// Make computations for one user fail
    pub fn fail_for(&self, user_id: &str) {
        self.failing_users
            .lock()
            .unwrap()
            .insert(user_id.to_string());
    }

    pub fn compute_call_count(&self) -> usize {
        self.compute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GapAnalysisService for MockGapAnalysisService {
    async fn compute_learning_gaps(&self, user_id: &str) -> AnalyticsResult<Vec<LearningGap>> {
        self.compute_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_users.lock().unwrap().contains(user_id) {
            return Err(AnalyticsError::Computation(format!(
                "simulated gap analysis failure for {user_id}"
            )));
        }
        Ok(self
            .gaps
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics> {
        Ok(ModelMetrics {
            accuracy: 0.9,
            precision: 0.9,
            recall: 0.9,
            training_samples: records.len(),
            trained_at: Utc::now(),
        })
    }
}

/// Mock recommendation service with per-user results and failure injection
#[derive(Clone, Default)]
pub struct MockRecommendationService {
    recommendations: Arc<Mutex<HashMap<String, Vec<Recommendation>>>>,
    failing_users: Arc<Mutex<HashSet<String>>>,
    compute_calls: Arc<AtomicUsize>,
}

impl MockRecommendationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_recommendations(&self, user_id: &str, recommendations: Vec<Recommendation>) {
        self.recommendations
            .lock()
            .unwrap()
            .insert(user_id.to_string(), recommendations);
    }

    pub fn fail_for(&self, user_id: &str) {
        self.failing_users
            .lock()
            .unwrap()
            .insert(user_id.to_string());
    }

    pub fn compute_call_count(&self) -> usize {
        self.compute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationService for MockRecommendationService {
    async fn compute_recommendations(
        &self,
        user_id: &str,
    ) -> AnalyticsResult<Vec<Recommendation>> {
        self.compute_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_users.lock().unwrap().contains(user_id) {
            return Err(AnalyticsError::Computation(format!(
                "simulated recommendation failure for {user_id}"
            )));
        }
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn train_model(&self, records: &[PerformanceRecord]) -> AnalyticsResult<ModelMetrics> {
        Ok(ModelMetrics {
            accuracy: 0.9,
            precision: 0.9,
            recall: 0.9,
            training_samples: records.len(),
            trained_at: Utc::now(),
        })
    }
}

/// Cache store that fails every operation, simulating an unreachable backend
#[derive(Debug, Default)]
pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> AnalyticsResult<Option<Vec<u8>>> {
        Err(AnalyticsError::CacheUnavailable(
            "simulated backend outage".to_string(),
        ))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> AnalyticsResult<()> {
        Err(AnalyticsError::CacheUnavailable(
            "simulated backend outage".to_string(),
        ))
    }

    async fn delete(&self, _key: &str) -> AnalyticsResult<bool> {
        Err(AnalyticsError::CacheUnavailable(
            "simulated backend outage".to_string(),
        ))
    }

    async fn health_check(&self) -> AnalyticsResult<bool> {
        Ok(false)
    }
}

/// Build a performance record for tests
pub fn performance_record(
    user_id: &str,
    score: f64,
    max_score: f64,
    days_ago: i64,
) -> PerformanceRecord {
    PerformanceRecord {
        user_id: user_id.to_string(),
        score,
        max_score,
        submission_type: "quiz".to_string(),
        timestamp: Utc::now() - chrono::Duration::days(days_ago),
    }
}

/// Build a learning gap for tests
pub fn learning_gap(concept_id: &str, severity: f64) -> LearningGap {
    LearningGap {
        concept_id: concept_id.to_string(),
        gap_severity: severity,
        detected_at: Utc::now(),
    }
}

/// Build a recommendation for tests
pub fn recommendation(resource_id: &str, priority_score: f64, completed: bool) -> Recommendation {
    Recommendation {
        resource_id: resource_id.to_string(),
        resource_type: "practice".to_string(),
        concept_id: None,
        priority_score,
        completed,
    }
}
