//! Worker池服务
//!
//! 每个队列一个消费者循环，带超时轮询与停止信号；按任务类型分发到
//! 注册的处理器，处理器错误只计数不中断循环（按任务隔离故障）。
//! 另有一个性能监控循环，定期刷新队列深度并把指标快照写入缓存。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use analytics_domain::entities::{PerformanceMetrics, QueueKind, Task, TaskType};
use analytics_domain::messaging::{QueueStatus, TaskQueue};
use analytics_errors::{AnalyticsError, AnalyticsResult};
use analytics_infrastructure::cache::LayeredCacheService;
use analytics_infrastructure::metrics::MetricsCollector;

use crate::handlers::TaskHandler;

/// Worker池构建器
pub struct WorkerPoolBuilder {
    queue: Arc<dyn TaskQueue>,
    metrics: Arc<MetricsCollector>,
    cache: Arc<LayeredCacheService>,
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    poll_timeout_ms: u64,
    monitoring_interval_seconds: u64,
}

impl WorkerPoolBuilder {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        metrics: Arc<MetricsCollector>,
        cache: Arc<LayeredCacheService>,
    ) -> Self {
        Self {
            queue,
            metrics,
            cache,
            handlers: HashMap::new(),
            poll_timeout_ms: 1000,
            monitoring_interval_seconds: 60,
        }
    }

    /// 设置出队轮询超时
    pub fn poll_timeout_ms(mut self, poll_timeout_ms: u64) -> Self {
        self.poll_timeout_ms = poll_timeout_ms;
        self
    }

    /// 设置性能监控间隔
    pub fn monitoring_interval_seconds(mut self, monitoring_interval_seconds: u64) -> Self {
        self.monitoring_interval_seconds = monitoring_interval_seconds;
        self
    }

    /// 注册任务处理器
    pub fn register_handler(
        mut self,
        task_type: TaskType,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        info!("注册任务处理器: {} -> {}", task_type.as_str(), handler.name());
        self.handlers.insert(task_type, handler);
        self
    }

    /// 批量注册任务处理器
    pub fn register_handlers(mut self, handlers: HashMap<TaskType, Arc<dyn TaskHandler>>) -> Self {
        for (task_type, handler) in handlers {
            info!("注册任务处理器: {} -> {}", task_type.as_str(), handler.name());
            self.handlers.insert(task_type, handler);
        }
        self
    }

    /// 构建WorkerPool
    pub fn build(self) -> WorkerPool {
        WorkerPool {
            queue: self.queue,
            metrics: self.metrics,
            cache: self.cache,
            handlers: Arc::new(self.handlers),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            monitoring_interval: Duration::from_secs(self.monitoring_interval_seconds),
            is_running: Arc::new(RwLock::new(false)),
            shutdown_tx: Arc::new(RwLock::new(None)),
            worker_tasks: Arc::new(Mutex::new(Vec::new())),
            hostname: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
        }
    }
}

/// Worker池实现
pub struct WorkerPool {
    /// 任务队列
    queue: Arc<dyn TaskQueue>,

    /// 指标收集器（注入式，按引用共享）
    metrics: Arc<MetricsCollector>,

    /// 缓存服务（用于指标快照）
    cache: Arc<LayeredCacheService>,

    /// 任务类型到处理器的映射
    handlers: Arc<HashMap<TaskType, Arc<dyn TaskHandler>>>,

    /// 出队轮询超时
    poll_timeout: Duration,

    /// 性能监控间隔
    monitoring_interval: Duration,

    /// 是否正在运行
    is_running: Arc<RwLock<bool>>,

    /// 停止信号
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,

    /// 消费者任务句柄
    worker_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,

    /// 主机名（用于日志）
    hostname: String,
}

impl WorkerPool {
    pub fn builder(
        queue: Arc<dyn TaskQueue>,
        metrics: Arc<MetricsCollector>,
        cache: Arc<LayeredCacheService>,
    ) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(queue, metrics, cache)
    }

    /// 已注册的任务类型列表
    pub fn registered_task_types(&self) -> Vec<TaskType> {
        self.handlers.keys().copied().collect()
    }

    /// 启动所有消费者循环与监控循环
    pub async fn start(&self) -> AnalyticsResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(AnalyticsError::Internal("Worker池已在运行".to_string()));
        }

        info!("启动Worker池 (host: {})", self.hostname);

        let (shutdown_tx, _) = broadcast::channel(1);
        {
            let mut tx_guard = self.shutdown_tx.write().await;
            *tx_guard = Some(shutdown_tx.clone());
        }

        let mut tasks = self.worker_tasks.lock().await;

        // 每个队列一个消费者循环
        for queue_kind in QueueKind::all() {
            let worker = self.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                worker.consume_loop(queue_kind, shutdown_rx).await;
            }));
        }

        // 性能监控循环
        let monitor = self.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            monitor.monitoring_loop(shutdown_rx).await;
        }));

        *is_running = true;
        info!("Worker池启动成功，共 {} 个消费者", QueueKind::all().len());
        Ok(())
    }

    /// 停止所有循环，尽力等待当前任务结束
    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }

        info!("停止Worker池");

        {
            let tx_guard = self.shutdown_tx.read().await;
            if let Some(ref shutdown_tx) = *tx_guard {
                let _ = shutdown_tx.send(());
            }
        }

        // 尽力等待消费者退出；超时则放弃等待
        let mut tasks = self.worker_tasks.lock().await;
        for handle in tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                warn!("消费者任务未在超时内退出");
            }
        }

        *is_running = false;
        info!("Worker池已停止");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 队列状态快照（深度 + 运行标志）
    pub async fn get_queue_status(&self) -> QueueStatus {
        QueueStatus {
            depths: self.queue.queue_depths().await,
            is_running: self.is_running().await,
        }
    }

    /// 当前性能指标快照
    pub async fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot().await
    }

    /// 单个队列的消费循环
    ///
    /// 循环不变量：运行中则带超时出队；超时继续下一轮（同时观察停止
    /// 信号）；拿到任务则分发。
    async fn consume_loop(&self, queue_kind: QueueKind, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("队列 '{}' 的消费者已启动", queue_kind.as_str());

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("队列 '{}' 的消费者收到停止信号", queue_kind.as_str());
                    break;
                }
                task = self.queue.dequeue(queue_kind, self.poll_timeout) => {
                    match task {
                        // 超时：继续下一轮
                        None => continue,
                        Some(task) => self.dispatch(task).await,
                    }
                }
            }
        }
    }

    /// 按任务类型分发到处理器，计时并记录成败
    async fn dispatch(&self, task: Task) {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            // 未注册的类型：记录并丢弃，不重试
            warn!(
                "未注册的任务类型 '{}'，丢弃任务 {}",
                task.task_type.as_str(),
                task.id
            );
            return;
        };

        debug!(
            "开始处理任务: id={}, type={}, scheduled_by={}",
            task.id,
            task.task_type.as_str(),
            task.scheduled_by
        );

        let start = std::time::Instant::now();
        match handler.handle(&task).await {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                self.metrics
                    .record_task_success(task.task_type, elapsed)
                    .await;
                debug!(
                    "任务处理成功: id={}, type={}, duration={:.3}s",
                    task.id,
                    task.task_type.as_str(),
                    elapsed
                );
            }
            Err(e) => {
                // 故障按任务隔离：记录上下文并继续消费下一个任务
                error!(
                    "任务处理失败: id={}, type={}, scheduled_by={}, scheduled_at={}, error={}",
                    task.id,
                    task.task_type.as_str(),
                    task.scheduled_by,
                    task.scheduled_at,
                    e
                );
                self.metrics.record_task_failure(task.task_type).await;
            }
        }
    }

    /// 性能监控循环：刷新队列深度、缓存命中率，并把快照写入缓存
    async fn monitoring_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut tick = interval(self.monitoring_interval);
        // 第一次tick立即返回，跳过
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("性能监控循环收到停止信号");
                    break;
                }
                _ = tick.tick() => {
                    let depths = self.queue.queue_depths().await;
                    let total_queued: usize = depths.values().sum();
                    self.metrics.update_queue_sizes(depths).await;

                    let cache_stats = self.cache.stats().await;
                    self.metrics.record_cache_hit_rate(cache_stats.hit_rate());

                    let snapshot = self.metrics.snapshot().await;
                    self.cache.cache_worker_metrics(&snapshot).await;

                    if total_queued > 0 {
                        info!(
                            "Worker状态 - 队列积压: {}, 已处理: {}, 失败: {}",
                            total_queued, snapshot.tasks_processed, snapshot.tasks_failed
                        );
                    }
                }
            }
        }
    }
}

// 支持在异步任务中克隆使用
impl Clone for WorkerPool {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            metrics: Arc::clone(&self.metrics),
            cache: Arc::clone(&self.cache),
            handlers: Arc::clone(&self.handlers),
            poll_timeout: self.poll_timeout,
            monitoring_interval: self.monitoring_interval,
            is_running: Arc::clone(&self.is_running),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            worker_tasks: Arc::clone(&self.worker_tasks),
            hostname: self.hostname.clone(),
        }
    }
}
