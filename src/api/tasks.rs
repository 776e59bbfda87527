//! Task endpoints.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{CreateTaskRequest, CreateTaskResponse, ReminderOutcome};
use crate::reminder::DispatchError;
use crate::store::{NewTask, Task};

/// Create a task, then fire the immediate one-shot reminder through the
/// same dispatch routine the scheduler uses. The task is saved regardless
/// of the notification outcome; a failed send only shows up in the
/// response and leaves the task eligible for the scheduler.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<CreateTaskResponse>, (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }

    let task = state
        .store
        .create_task(NewTask {
            user_id: user.id,
            title: req.title.trim().to_string(),
            description: req.description,
            due_date: req.due_date,
        })
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let reminder = match state.reminders.dispatch(&task).await {
        Ok(_) => ReminderOutcome::Sent,
        Err(DispatchError::AlreadySent(_)) => ReminderOutcome::Skipped,
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "creation-time reminder failed");
            ReminderOutcome::Failed
        }
    };

    // Re-read so the response reflects the sent-flag written by dispatch.
    let task = state
        .store
        .get_task(task.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .unwrap_or(task);

    Ok(Json(CreateTaskResponse { task, reminder }))
}

/// List the authenticated user's tasks (dashboard view).
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = state
        .store
        .list_tasks_for_user(user.id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(tasks))
}

/// Fetch one task, owner-checked.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .store
        .get_task(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match task {
        Some(t) if t.user_id == user.id => Ok(Json(t)),
        // Hide other users' tasks behind the same 404
        _ => Err((StatusCode::NOT_FOUND, "Task not found".to_string())),
    }
}
