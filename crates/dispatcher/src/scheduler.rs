//! 周期调度器
//!
//! 定时产生批量后台任务的生产者：ML训练（每小时）、活跃用户分析批处理
//! （每5分钟）、缓存刷新（每10分钟）。调度器只入队、不执行，
//! 生产与消费完全分离，消费侧可独立测试。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use analytics_domain::entities::{QueueKind, Task, TaskType};
use analytics_domain::messaging::TaskQueue;
use analytics_domain::repositories::PerformanceRepository;
use analytics_errors::{AnalyticsError, AnalyticsResult};

/// 周期调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// ML训练调度间隔（秒）
    pub ml_training_interval_seconds: u64,
    /// 分析批处理调度间隔（秒）
    pub analytics_batch_interval_seconds: u64,
    /// 缓存刷新调度间隔（秒）
    pub cache_refresh_interval_seconds: u64,
    /// 单批调度的活跃用户数上限
    pub analytics_batch_size: usize,
    /// 活跃用户回看窗口（小时）
    pub activity_window_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ml_training_interval_seconds: 3600,
            analytics_batch_interval_seconds: 300,
            cache_refresh_interval_seconds: 600,
            analytics_batch_size: 100,
            activity_window_hours: 24,
        }
    }
}

/// 周期调度器
pub struct PeriodicScheduler {
    queue: Arc<dyn TaskQueue>,
    performance_repo: Arc<dyn PerformanceRepository>,
    config: SchedulerConfig,
    is_running: Arc<RwLock<bool>>,
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    scheduler_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PeriodicScheduler {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        performance_repo: Arc<dyn PerformanceRepository>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue,
            performance_repo,
            config,
            is_running: Arc::new(RwLock::new(false)),
            shutdown_tx: Arc::new(RwLock::new(None)),
            scheduler_tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 启动三个调度循环
    pub async fn start(&self) -> AnalyticsResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(AnalyticsError::Internal("周期调度器已在运行".to_string()));
        }

        info!("启动周期调度器");

        let (shutdown_tx, _) = broadcast::channel(1);
        {
            let mut tx_guard = self.shutdown_tx.write().await;
            *tx_guard = Some(shutdown_tx.clone());
        }

        let mut tasks = self.scheduler_tasks.lock().await;

        // ML训练调度循环
        let scheduler = self.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let ml_interval = Duration::from_secs(self.config.ml_training_interval_seconds);
        tasks.push(tokio::spawn(async move {
            let mut tick = interval(ml_interval);
            tick.tick().await; // 跳过立即触发的首个tick
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tick.tick() => {
                        let count = scheduler.produce_ml_training_tasks().await;
                        info!("已调度 {} 个周期ML训练任务", count);
                    }
                }
            }
            info!("ML训练调度循环已退出");
        }));

        // 分析批处理调度循环
        let scheduler = self.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let batch_interval = Duration::from_secs(self.config.analytics_batch_interval_seconds);
        tasks.push(tokio::spawn(async move {
            let mut tick = interval(batch_interval);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tick.tick() => {
                        match scheduler.produce_analytics_batch().await {
                            Ok(count) => info!("已为 {} 个活跃用户调度分析任务", count),
                            Err(e) => error!("分析批处理调度失败: {}", e),
                        }
                    }
                }
            }
            info!("分析批处理调度循环已退出");
        }));

        // 缓存刷新调度循环
        let scheduler = self.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let refresh_interval = Duration::from_secs(self.config.cache_refresh_interval_seconds);
        tasks.push(tokio::spawn(async move {
            let mut tick = interval(refresh_interval);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tick.tick() => {
                        let count = scheduler.produce_cache_refresh_tasks().await;
                        info!("已调度 {} 个周期缓存刷新任务", count);
                    }
                }
            }
            info!("缓存刷新调度循环已退出");
        }));

        *is_running = true;
        info!("周期调度器启动成功");
        Ok(())
    }

    /// 停止所有调度循环
    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }

        info!("停止周期调度器");

        {
            let tx_guard = self.shutdown_tx.read().await;
            if let Some(ref shutdown_tx) = *tx_guard {
                let _ = shutdown_tx.send(());
            }
        }

        let mut tasks = self.scheduler_tasks.lock().await;
        for handle in tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                warn!("调度循环未在超时内退出");
            }
        }

        *is_running = false;
        info!("周期调度器已停止");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 每个可训练模型入队一个重训练任务
    pub async fn produce_ml_training_tasks(&self) -> usize {
        let mut count = 0;
        for task_type in [
            TaskType::GapDetectionTraining,
            TaskType::RecommendationTraining,
        ] {
            let task = Task::ml_training(task_type, "ml_training_scheduler");
            if self.queue.enqueue(QueueKind::MlTraining, task).await {
                count += 1;
            }
        }
        count
    }

    /// 为最近活跃用户（回看窗口内有登录）入队分析预计算任务，按批量上限截断
    pub async fn produce_analytics_batch(&self) -> AnalyticsResult<usize> {
        let since = Utc::now() - chrono::Duration::hours(self.config.activity_window_hours);
        let active_users = self
            .performance_repo
            .recently_active_users(since, self.config.analytics_batch_size)
            .await?;

        let mut count = 0;
        for user_id in &active_users {
            let task = Task::analytics_precompute(user_id, "analytics_batch_scheduler");
            if self.queue.enqueue(QueueKind::Analytics, task).await {
                count += 1;
            }
        }
        Ok(count)
    }

    /// 入队固定的一组缓存刷新任务（看板、用户分析、推荐）
    pub async fn produce_cache_refresh_tasks(&self) -> usize {
        let refresh_tasks = [
            (TaskType::DashboardRefresh, "active_users"),
            (TaskType::UserAnalyticsRefresh, "recent_updates"),
            (TaskType::RecommendationsRefresh, "active_recommendations"),
        ];

        let mut count = 0;
        for (task_type, scope) in refresh_tasks {
            let task = Task::cache_refresh(task_type, scope, "cache_refresh_scheduler");
            if self.queue.enqueue(QueueKind::CacheRefresh, task).await {
                count += 1;
            }
        }
        count
    }
}

impl Clone for PeriodicScheduler {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            performance_repo: Arc::clone(&self.performance_repo),
            config: self.config.clone(),
            is_running: Arc::clone(&self.is_running),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            scheduler_tasks: Arc::clone(&self.scheduler_tasks),
        }
    }
}
