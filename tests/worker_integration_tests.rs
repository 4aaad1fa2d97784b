use std::sync::Arc;
use std::time::Duration;

use tracing_test::traced_test;

use analytics_application::{AnalyticsPrecomputeService, PrecomputeConfig};
use analytics_domain::entities::{QueueKind, Task, TaskType};
use analytics_domain::messaging::TaskQueue;
use analytics_infrastructure::cache::{
    CacheManager, CacheTtl, LayeredCacheService, MemoryCacheStore,
};
use analytics_infrastructure::metrics::MetricsCollector;
use analytics_infrastructure::queue::{QueueConfig, TaskQueueManager};
use analytics_testing_utils::{
    learning_gap, performance_record, recommendation, MockGapAnalysisService,
    MockPerformanceRepository, MockRecommendationService,
};
use analytics_worker::{default_handlers, WorkerPool};

struct Harness {
    queue: Arc<TaskQueueManager>,
    cache: Arc<LayeredCacheService>,
    metrics: Arc<MetricsCollector>,
    pool: WorkerPool,
    performance: MockPerformanceRepository,
    gaps: MockGapAnalysisService,
    recommendations: MockRecommendationService,
}

/// 装配完整的 队列 → Worker → 预计算 → 缓存 管线（内存后端）
fn harness() -> Harness {
    let queue = Arc::new(TaskQueueManager::new(QueueConfig::default()));
    let cache = Arc::new(LayeredCacheService::new(
        CacheManager::new(Arc::new(MemoryCacheStore::new()), Duration::from_secs(3600)),
        CacheTtl::default(),
    ));
    let metrics = Arc::new(MetricsCollector::new());

    let performance = MockPerformanceRepository::new();
    let gaps = MockGapAnalysisService::new();
    let recommendations = MockRecommendationService::new();

    let precompute = Arc::new(AnalyticsPrecomputeService::new(
        Arc::new(performance.clone()),
        Arc::new(gaps.clone()),
        Arc::new(recommendations.clone()),
        cache.clone(),
        queue.clone(),
        PrecomputeConfig {
            batch_delay_ms: 0,
            ..Default::default()
        },
    ));

    let handlers = default_handlers(
        precompute,
        Arc::new(performance.clone()),
        Arc::new(gaps.clone()),
        Arc::new(recommendations.clone()),
        cache.clone(),
        queue.clone(),
    );

    let pool = WorkerPool::builder(queue.clone(), metrics.clone(), cache.clone())
        .poll_timeout_ms(50)
        .monitoring_interval_seconds(3600)
        .register_handlers(handlers)
        .build();

    Harness {
        queue,
        cache,
        metrics,
        pool,
        performance,
        gaps,
        recommendations,
    }
}

/// 轮询等待异步条件成立
async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition().await
}

#[tokio::test]
#[traced_test]
async fn test_precompute_task_flows_through_worker_to_cache() {
    let h = harness();
    h.performance
        .add_record(performance_record("u1", 4.0, 10.0, 2));
    h.gaps
        .set_gaps("u1", vec![learning_gap("math.algebra", 0.9)]);
    h.recommendations
        .set_recommendations("u1", vec![recommendation("r1", 0.95, false)]);

    h.pool.start().await.unwrap();

    assert!(
        h.queue
            .enqueue(
                QueueKind::Analytics,
                Task::analytics_precompute("u1", "integration_test"),
            )
            .await
    );

    // Worker消费任务后，预计算结果包应出现在缓存中
    let cached = wait_for(
        || async { h.cache.get_precomputed_bundle("u1").await.is_some() },
        Duration::from_secs(3),
    )
    .await;
    assert!(cached, "预计算结果应已写入缓存");

    let bundle = h.cache.get_precomputed_bundle("u1").await.unwrap();
    assert_eq!(bundle.learning_gaps.total_gaps, 1);
    assert_eq!(bundle.recommendations.active_recommendations, 1);

    let metrics = h.pool.get_performance_metrics().await;
    assert_eq!(metrics.tasks_processed, 1);
    assert_eq!(metrics.tasks_failed, 0);

    h.pool.stop().await;
}

#[tokio::test]
#[traced_test]
async fn test_handler_failure_does_not_break_worker_loop() {
    let h = harness();
    for user in ["bad-user", "good-user"] {
        h.performance
            .add_record(performance_record(user, 4.0, 10.0, 1));
    }
    // bad-user的差距计算失败；good-user正常
    h.gaps.fail_for("bad-user");
    h.gaps.set_gaps("good-user", vec![]);

    h.pool.start().await.unwrap();

    h.queue
        .enqueue(
            QueueKind::Analytics,
            Task::analytics_precompute("bad-user", "integration_test"),
        )
        .await;
    h.queue
        .enqueue(
            QueueKind::Analytics,
            Task::analytics_precompute("good-user", "integration_test"),
        )
        .await;

    // 失败任务之后的任务仍被处理
    let processed = wait_for(
        || async { h.cache.get_precomputed_bundle("good-user").await.is_some() },
        Duration::from_secs(3),
    )
    .await;
    assert!(processed, "失败任务不应中断后续任务");

    let metrics = h.metrics.snapshot().await;
    assert_eq!(metrics.tasks_failed, 1);
    assert_eq!(metrics.tasks_processed, 1);
    assert!(h.cache.get_precomputed_bundle("bad-user").await.is_none());

    h.pool.stop().await;
}

#[tokio::test]
async fn test_ml_training_task_caches_model_metrics() {
    let h = harness();
    // 超过差距检测模型的最小样本数（100）
    for i in 0..120 {
        h.performance
            .add_record(performance_record(&format!("u{i}"), 6.0, 10.0, 1));
    }

    h.pool.start().await.unwrap();

    h.queue
        .enqueue(
            QueueKind::MlTraining,
            Task::ml_training(TaskType::GapDetectionTraining, "integration_test"),
        )
        .await;

    let trained = wait_for(
        || async { h.cache.get_model_metrics("gap_detection").await.is_some() },
        Duration::from_secs(3),
    )
    .await;
    assert!(trained, "训练完成后模型指标应写入缓存");

    let metrics = h.cache.get_model_metrics("gap_detection").await.unwrap();
    assert_eq!(metrics.training_samples, 120);

    h.pool.stop().await;
}

#[tokio::test]
async fn test_ml_training_skipped_below_min_samples() {
    let h = harness();
    // 只有10条样本，低于最小样本数：跳过训练但任务算成功
    for i in 0..10 {
        h.performance
            .add_record(performance_record(&format!("u{i}"), 6.0, 10.0, 1));
    }

    h.pool.start().await.unwrap();

    h.queue
        .enqueue(
            QueueKind::MlTraining,
            Task::ml_training(TaskType::GapDetectionTraining, "integration_test"),
        )
        .await;

    let processed = wait_for(
        || async { h.metrics.snapshot().await.tasks_processed == 1 },
        Duration::from_secs(3),
    )
    .await;
    assert!(processed);
    assert!(h.cache.get_model_metrics("gap_detection").await.is_none());

    h.pool.stop().await;
}

#[tokio::test]
async fn test_batch_task_reports_partial_failure() {
    let h = harness();
    for user in ["u1", "u2", "u3"] {
        h.performance
            .add_record(performance_record(user, 5.0, 10.0, 1));
    }
    h.gaps.fail_for("u2");

    h.pool.start().await.unwrap();

    h.queue
        .enqueue(
            QueueKind::Analytics,
            Task::batch_analytics_update(
                &["u1".to_string(), "u2".to_string(), "u3".to_string()],
                "integration_test",
            ),
        )
        .await;

    // 批处理整体算成功（单用户失败不中断批次）
    let processed = wait_for(
        || async { h.metrics.snapshot().await.tasks_processed == 1 },
        Duration::from_secs(3),
    )
    .await;
    assert!(processed);

    assert!(h.cache.get_precomputed_bundle("u1").await.is_some());
    assert!(h.cache.get_precomputed_bundle("u2").await.is_none());
    assert!(h.cache.get_precomputed_bundle("u3").await.is_some());

    h.pool.stop().await;
}
