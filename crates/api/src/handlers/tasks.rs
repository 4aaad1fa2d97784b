use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use analytics_domain::entities::{QueueKind, Task, TaskPriority, TaskType};

use crate::error::{ApiError, ApiResult};
use crate::response::{success, ApiResponse};
use crate::routes::AppState;

/// 分析任务调度请求
#[derive(Debug, Deserialize)]
pub struct ScheduleAnalyticsRequest {
    pub user_id: Option<String>,
    pub user_ids: Option<Vec<String>>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
}

/// ML训练任务调度请求
#[derive(Debug, Deserialize)]
pub struct ScheduleMlTrainingRequest {
    pub task_type: Option<TaskType>,
}

/// 任务调度结果
#[derive(Debug, Serialize)]
pub struct ScheduleTaskResponse {
    pub task_id: uuid::Uuid,
    pub task_type: TaskType,
    pub scheduled: bool,
}

/// 调度分析计算任务
pub async fn schedule_analytics_task(
    State(state): State<AppState>,
    Json(request): Json<ScheduleAnalyticsRequest>,
) -> ApiResult<ApiResponse<ScheduleTaskResponse>> {
    let task_type = request.task_type.unwrap_or(TaskType::UserAnalyticsPrecompute);
    if task_type.queue() != QueueKind::Analytics {
        return Err(ApiError::BadRequest(format!(
            "任务类型 {} 不属于分析队列",
            task_type.as_str()
        )));
    }

    let task = match task_type {
        TaskType::BatchAnalyticsUpdate => {
            let user_ids = request
                .user_ids
                .filter(|ids| !ids.is_empty())
                .ok_or_else(|| ApiError::BadRequest("批量任务缺少user_ids".to_string()))?;
            Task::batch_analytics_update(&user_ids, "api")
        }
        _ => {
            let user_id = request
                .user_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ApiError::BadRequest("缺少user_id".to_string()))?;
            Task::new(
                task_type,
                serde_json::json!({ "user_id": user_id }),
                "api",
            )
        }
    };

    let task = match request.priority {
        Some(priority) => task.with_priority(priority),
        None => task,
    };

    let task_id = task.id;
    let scheduled = state.queue.enqueue(QueueKind::Analytics, task).await;

    Ok(success(ScheduleTaskResponse {
        task_id,
        task_type,
        scheduled,
    }))
}

/// 调度ML模型训练任务
pub async fn schedule_ml_training_task(
    State(state): State<AppState>,
    Json(request): Json<ScheduleMlTrainingRequest>,
) -> ApiResult<ApiResponse<ScheduleTaskResponse>> {
    let task_type = request.task_type.unwrap_or(TaskType::GapDetectionTraining);
    if task_type.queue() != QueueKind::MlTraining {
        return Err(ApiError::BadRequest(format!(
            "任务类型 {} 不属于ML训练队列",
            task_type.as_str()
        )));
    }

    let task = Task::ml_training(task_type, "api");
    let task_id = task.id;
    let scheduled = state.queue.enqueue(QueueKind::MlTraining, task).await;

    Ok(success(ScheduleTaskResponse {
        task_id,
        task_type,
        scheduled,
    }))
}
