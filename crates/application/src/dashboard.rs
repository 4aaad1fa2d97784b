//! 看板读路径回退控制器
//!
//! 登录等热路径的降级读取链：预计算结果包 → 看板缓存 → 轻量实时聚合
//! （短窗口、窄查询）→ 缓存实时结果 → 后台调度完整预计算。
//! 调用方永远拿到带来源标记的结果，任何一环失败都不会抛给上层。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use analytics_domain::entities::{
    DashboardData, DataSource, GapOverview, PerformanceOverview, RecommendationOverview,
    TrendOverview, HIGH_PRIORITY_SCORE, HIGH_SEVERITY_THRESHOLD,
};
use analytics_domain::repositories::{
    GapRepository, PerformanceRepository, RecommendationRepository,
};
use analytics_errors::AnalyticsResult;
use analytics_infrastructure::cache::{CacheType, LayeredCacheService};

use crate::precompute::AnalyticsPrecomputeService;

/// 看板读路径配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// 实时聚合回看窗口（天）
    pub realtime_lookback_days: i64,
    /// 实时结果缓存TTL（秒）
    pub realtime_ttl_seconds: u64,
    /// 回退后调度预计算的延迟（秒）
    pub precompute_delay_seconds: u64,
    /// 实时查询的差距严重度下限
    pub min_gap_severity: f64,
    /// 实时查询保留的差距条数
    pub max_gaps: usize,
    /// 实时查询保留的推荐条数
    pub max_recommendations: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            realtime_lookback_days: 7,
            realtime_ttl_seconds: 300,
            precompute_delay_seconds: 30,
            min_gap_severity: 0.5,
            max_gaps: 5,
            max_recommendations: 3,
        }
    }
}

/// 看板数据服务
pub struct DashboardService {
    cache: Arc<LayeredCacheService>,
    performance_repo: Arc<dyn PerformanceRepository>,
    gap_repo: Arc<dyn GapRepository>,
    recommendation_repo: Arc<dyn RecommendationRepository>,
    precompute: Arc<AnalyticsPrecomputeService>,
    config: DashboardConfig,
}

impl DashboardService {
    pub fn new(
        cache: Arc<LayeredCacheService>,
        performance_repo: Arc<dyn PerformanceRepository>,
        gap_repo: Arc<dyn GapRepository>,
        recommendation_repo: Arc<dyn RecommendationRepository>,
        precompute: Arc<AnalyticsPrecomputeService>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            cache,
            performance_repo,
            gap_repo,
            recommendation_repo,
            precompute,
            config,
        }
    }

    /// 获取用户看板数据，逐级回退，永不失败
    pub async fn get_dashboard_data(&self, user_id: &str) -> DashboardData {
        // 1. 预计算结果包
        if let Some(bundle) = self.cache.get_precomputed_bundle(user_id).await {
            info!("用户 {} 命中预计算结果", user_id);
            return DashboardData::from_bundle(&bundle);
        }

        // 2. 看板缓存（上一次实时计算的结果）
        if let Some(data) = self.cache.get_dashboard_data(user_id).await {
            info!("用户 {} 命中看板缓存", user_id);
            return data.with_source(DataSource::Cached);
        }

        // 3. 轻量实时聚合
        info!("用户 {} 缓存全部未命中，执行实时计算", user_id);
        let data = match self.compute_realtime(user_id).await {
            Ok(data) => data,
            Err(e) => {
                // 4'. 全链路失败：返回零值兜底数据
                error!("用户 {} 实时看板计算失败: {}", user_id, e);
                return DashboardData::fallback();
            }
        };

        // 4. 短TTL缓存实时结果，窗口内的重复请求免于重算
        self.cache
            .set(
                user_id,
                &data,
                CacheType::DashboardData,
                Some(Duration::from_secs(self.config.realtime_ttl_seconds)),
            )
            .await;

        // 5. 后台调度完整预计算，下次请求走第1步
        self.precompute.schedule_precompute(
            user_id,
            Duration::from_secs(self.config.precompute_delay_seconds),
            "dashboard_fallback",
        );

        data
    }

    /// 轻量实时聚合：窄窗口、少量关联查询、精简返回形态
    async fn compute_realtime(&self, user_id: &str) -> AnalyticsResult<DashboardData> {
        let since = Utc::now() - chrono::Duration::days(self.config.realtime_lookback_days);

        let records = self
            .performance_repo
            .fetch_recent_performance(user_id, since)
            .await?;
        let gaps = self
            .gap_repo
            .significant_gaps(user_id, self.config.min_gap_severity, self.config.max_gaps)
            .await?;
        let recommendations = self
            .recommendation_repo
            .active_recommendations(user_id, self.config.max_recommendations)
            .await?;

        let avg_recent_score = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.score).sum::<f64>() / records.len() as f64
        };

        let mut recent_activity = records.clone();
        recent_activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent_activity.truncate(5);

        Ok(DashboardData {
            source: DataSource::Realtime,
            computed_at: Utc::now(),
            performance_summary: PerformanceOverview {
                recent_activity_count: records.len(),
                avg_recent_score,
            },
            learning_gaps: GapOverview {
                total_gaps: gaps.len(),
                high_priority_gaps: gaps
                    .iter()
                    .filter(|g| g.gap_severity >= HIGH_SEVERITY_THRESHOLD)
                    .count(),
            },
            recommendations: RecommendationOverview {
                active_recommendations: recommendations.len(),
                high_priority_recommendations: recommendations
                    .iter()
                    .filter(|r| r.priority_score >= HIGH_PRIORITY_SCORE)
                    .count(),
            },
            progress_trends: TrendOverview {
                trend_direction: Default::default(),
                recent_activity,
            },
        })
    }

    /// 清除用户的全部缓存（资料变更、账号删除时调用）
    pub async fn invalidate_user_cache(&self, user_id: &str) -> bool {
        let result = self.cache.invalidate_user(user_id).await;
        if !result {
            warn!("用户 {} 缓存清除不完整", user_id);
        }
        result
    }
}
