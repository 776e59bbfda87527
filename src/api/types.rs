//! API request and response types.

use crate::store::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to register a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response after registering.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
}

/// Login request.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response with a bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration unix seconds
    pub exp: i64,
}

/// Request to create a task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Due timestamp (RFC 3339)
    pub due_date: DateTime<Utc>,
}

/// Outcome of the one-shot reminder fired at task creation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    /// Mail sent and the task marked
    Sent,
    /// Notifier failed; the task stays eligible for the scheduler
    Failed,
    /// Not attempted (e.g. already sent)
    Skipped,
}

/// Response after creating a task. Creation succeeds even when the
/// immediate reminder does not.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskResponse {
    pub task: Task,
    pub reminder: ReminderOutcome,
}
