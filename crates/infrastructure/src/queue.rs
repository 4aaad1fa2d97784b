//! 内存任务队列实现
//!
//! 使用 Tokio mpsc channel 实现三个互相独立的有界FIFO队列
//! （ML训练、分析计算、缓存刷新）。队列满时直接丢弃任务并返回false，
//! 绝不阻塞生产者；出队使用超时轮询，便于消费者及时观察停止标志。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use analytics_domain::entities::{QueueKind, Task};
use analytics_domain::messaging::TaskQueue;

/// 队列容量配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// ML训练队列容量
    pub ml_training_capacity: usize,
    /// 分析计算队列容量
    pub analytics_capacity: usize,
    /// 缓存刷新队列容量
    pub cache_refresh_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            ml_training_capacity: 100,
            analytics_capacity: 500,
            cache_refresh_capacity: 200,
        }
    }
}

impl QueueConfig {
    fn capacity_for(&self, queue: QueueKind) -> usize {
        match queue {
            QueueKind::MlTraining => self.ml_training_capacity,
            QueueKind::Analytics => self.analytics_capacity,
            QueueKind::CacheRefresh => self.cache_refresh_capacity,
        }
    }
}

#[derive(Debug)]
struct QueueChannel {
    sender: mpsc::Sender<Task>,
    /// 使用 Mutex 包装接收端；每个队列只有一个消费者循环
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    /// 队列深度计数
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

/// 任务队列管理器
///
/// 独占持有三个队列的内容；任务一经入队即不可变，由消费者恰好消费一次
/// （at-most-once，不落盘，进程崩溃丢失队内任务是已接受的权衡）。
#[derive(Debug)]
pub struct TaskQueueManager {
    channels: HashMap<QueueKind, QueueChannel>,
}

impl TaskQueueManager {
    pub fn new(config: QueueConfig) -> Self {
        info!("Creating task queue manager with config: {:?}", config);

        let mut channels = HashMap::new();
        for queue in QueueKind::all() {
            let capacity = config.capacity_for(queue);
            let (sender, receiver) = mpsc::channel(capacity);
            channels.insert(
                queue,
                QueueChannel {
                    sender,
                    receiver: Arc::new(Mutex::new(receiver)),
                    depth: Arc::new(AtomicUsize::new(0)),
                    capacity,
                },
            );
            info!("Created queue '{}' (capacity: {})", queue.as_str(), capacity);
        }

        Self { channels }
    }

    /// 队列容量
    pub fn capacity(&self, queue: QueueKind) -> usize {
        self.channels[&queue].capacity
    }

    fn channel(&self, queue: QueueKind) -> &QueueChannel {
        // 三个队列在构造时全部建立
        &self.channels[&queue]
    }
}

impl Default for TaskQueueManager {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait]
impl TaskQueue for TaskQueueManager {
    async fn enqueue(&self, queue: QueueKind, task: Task) -> bool {
        let channel = self.channel(queue);
        let task_id = task.id;
        let task_type = task.task_type;

        match channel.sender.try_send(task) {
            Ok(()) => {
                channel.depth.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Enqueued task {} ({}) to queue '{}'",
                    task_id,
                    task_type.as_str(),
                    queue.as_str()
                );
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Queue '{}' is full, dropping task {} ({})",
                    queue.as_str(),
                    task_id,
                    task_type.as_str()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Queue '{}' is closed, dropping task {}", queue.as_str(), task_id);
                false
            }
        }
    }

    async fn dequeue(&self, queue: QueueKind, timeout: Duration) -> Option<Task> {
        let channel = self.channel(queue);
        let receiver = channel.receiver.clone();
        let mut rx = receiver.lock().await;

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(task)) => {
                channel.depth.fetch_sub(1, Ordering::Relaxed);
                debug!(
                    "Dequeued task {} from queue '{}'",
                    task.id,
                    queue.as_str()
                );
                Some(task)
            }
            // 通道关闭或超时都按“暂无任务”处理，调用方循环检查停止标志
            Ok(None) | Err(_) => None,
        }
    }

    async fn depth(&self, queue: QueueKind) -> usize {
        self.channel(queue).depth.load(Ordering::Relaxed)
    }

    async fn queue_depths(&self) -> HashMap<String, usize> {
        let mut depths = HashMap::new();
        for queue in QueueKind::all() {
            depths.insert(queue.as_str().to_string(), self.depth(queue).await);
        }
        depths
    }
}
