//! Performance metrics collection
//!
//! The collector is an injectable, Arc-shared object passed by reference to
//! workers and schedulers; no module-level state. Counters feed two sinks:
//! the `metrics` facade (Prometheus export) and an internal snapshot used
//! for the cached `PerformanceMetrics` view.

use chrono::Utc;
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use analytics_domain::entities::{PerformanceMetrics, QueueKind, TaskType};

#[derive(Debug, Default, Clone)]
struct MetricsInner {
    tasks_processed: u64,
    tasks_failed: u64,
    average_processing_time: f64,
    queue_sizes: HashMap<String, usize>,
}

/// Metrics collector for workers, schedulers and the cache stack
pub struct MetricsCollector {
    // Task metrics
    tasks_processed_total: Counter,
    tasks_failed_total: Counter,
    task_processing_duration: Histogram,

    // Queue metrics
    queue_depth: HashMap<QueueKind, Gauge>,
    queue_dropped_total: Counter,

    // Cache metrics
    cache_hit_rate: Gauge,

    // Internal snapshot state
    inner: Arc<RwLock<MetricsInner>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let tasks_processed_total = counter!("analytics_tasks_processed_total");
        let tasks_failed_total = counter!("analytics_tasks_failed_total");
        let task_processing_duration =
            histogram!("analytics_task_processing_duration_seconds");

        let mut queue_depth = HashMap::new();
        for queue in QueueKind::all() {
            queue_depth.insert(
                queue,
                gauge!("analytics_queue_depth", "queue" => queue.as_str()),
            );
        }
        let queue_dropped_total = counter!("analytics_queue_dropped_total");
        let cache_hit_rate = gauge!("analytics_cache_hit_rate");

        Self {
            tasks_processed_total,
            tasks_failed_total,
            task_processing_duration,
            queue_depth,
            queue_dropped_total,
            cache_hit_rate,
            inner: Arc::new(RwLock::new(MetricsInner::default())),
        }
    }

    /// Record a successfully processed task and fold its duration into the
    /// running average
    pub async fn record_task_success(&self, task_type: TaskType, duration_seconds: f64) {
        self.tasks_processed_total.increment(1);
        self.task_processing_duration.record(duration_seconds);
        counter!("analytics_tasks_by_type_total", "task_type" => task_type.as_str())
            .increment(1);

        let mut inner = self.inner.write().await;
        inner.tasks_processed += 1;
        let n = inner.tasks_processed as f64;
        inner.average_processing_time =
            (inner.average_processing_time * (n - 1.0) + duration_seconds) / n;

        debug!(
            "Task {} completed in {:.3}s (avg: {:.3}s)",
            task_type.as_str(),
            duration_seconds,
            inner.average_processing_time
        );
    }

    /// Record a failed task
    pub async fn record_task_failure(&self, task_type: TaskType) {
        self.tasks_failed_total.increment(1);
        counter!("analytics_task_failures_by_type_total", "task_type" => task_type.as_str())
            .increment(1);

        let mut inner = self.inner.write().await;
        inner.tasks_failed += 1;
    }

    /// Record a task dropped by a full queue
    pub fn record_task_dropped(&self, queue: QueueKind) {
        self.queue_dropped_total.increment(1);
        counter!("analytics_queue_dropped_by_queue_total", "queue" => queue.as_str())
            .increment(1);
    }

    /// Refresh queue depth gauges and the snapshot view
    pub async fn update_queue_sizes(&self, depths: HashMap<String, usize>) {
        for queue in QueueKind::all() {
            if let Some(depth) = depths.get(queue.as_str()) {
                if let Some(gauge) = self.queue_depth.get(&queue) {
                    gauge.set(*depth as f64);
                }
            }
        }
        self.inner.write().await.queue_sizes = depths;
    }

    /// Record the current cache hit rate
    pub fn record_cache_hit_rate(&self, hit_rate: f64) {
        self.cache_hit_rate.set(hit_rate);
    }

    /// Current snapshot of the internal counters
    pub async fn snapshot(&self) -> PerformanceMetrics {
        let inner = self.inner.read().await;
        PerformanceMetrics {
            tasks_processed: inner.tasks_processed,
            tasks_failed: inner.tasks_failed,
            average_processing_time: inner.average_processing_time,
            queue_sizes: inner.queue_sizes.clone(),
            last_updated: Utc::now(),
        }
    }

    /// Snapshot the internal counters and reset them to zero
    pub async fn snapshot_and_reset(&self) -> PerformanceMetrics {
        let mut inner = self.inner.write().await;
        let snapshot = PerformanceMetrics {
            tasks_processed: inner.tasks_processed,
            tasks_failed: inner.tasks_failed,
            average_processing_time: inner.average_processing_time,
            queue_sizes: inner.queue_sizes.clone(),
            last_updated: Utc::now(),
        };
        *inner = MetricsInner {
            queue_sizes: inner.queue_sizes.clone(),
            ..MetricsInner::default()
        };
        snapshot
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
