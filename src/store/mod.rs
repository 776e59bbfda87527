//! User/task storage module with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("background task join error: {0}")]
    Join(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// A registered user. Referenced by tasks via `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// PBKDF2 password hash; never the plaintext password
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A task with a due date. `reminder_sent` transitions false -> true at most
/// once, via [`TaskStore::mark_reminder_sent`], and is never reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
}

/// Task store trait - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// All tasks owned by a user, most recently created first.
    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Tasks with `due_date` in `[now, now + window]` and `reminder_sent`
    /// still false, ascending by due date.
    ///
    /// Tasks already overdue before `now` are never returned: missed
    /// reminders are permanently skipped, not sent late.
    async fn query_due_tasks(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Task>, StoreError>;

    /// Set `reminder_sent` for a task, conditionally: the write only happens
    /// if the flag is still false. Returns whether this call performed the
    /// transition, so concurrent dispatchers sharing one store cannot both
    /// claim the same task.
    async fn mark_reminder_sent(&self, task_id: Uuid) -> Result<bool, StoreError>;
}

/// Serialize a timestamp for SQLite TEXT columns (RFC 3339, sorts
/// chronologically).
pub(crate) fn ts_string(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp, falling back to the epoch on corrupt
/// rows rather than failing the whole query.
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}
