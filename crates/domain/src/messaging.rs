use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::{QueueKind, Task};

/// 队列状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub depths: HashMap<String, usize>,
    pub is_running: bool,
}

/// 任务队列端口
///
/// 三个互相独立的有界FIFO队列。入队满时丢弃并返回false（绝不阻塞生产者），
/// 出队超时返回None（非错误），以便消费者循环检查停止标志。
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队；队列满时丢弃任务、记录警告并返回false
    async fn enqueue(&self, queue: QueueKind, task: Task) -> bool;

    /// 出队；在timeout内没有任务时返回None
    async fn dequeue(&self, queue: QueueKind, timeout: Duration) -> Option<Task>;

    /// 队列当前深度
    async fn depth(&self, queue: QueueKind) -> usize;

    /// 所有队列深度
    async fn queue_depths(&self) -> HashMap<String, usize>;
}
