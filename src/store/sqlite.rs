//! SQLite-based task store.

use super::{parse_ts, ts_string, NewTask, NewUser, StoreError, Task, TaskStore, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    due_date TEXT NOT NULL,
    reminder_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_tasks_due_unsent ON tasks(due_date) WHERE reminder_sent = 0;
"#;

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Database(format!("create db dir: {}", e)))?;
            }
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let created_at: String = row.get(4)?;
    Ok(User {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_ts(&created_at),
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> Result<Task, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let user_id_str: String = row.get(1)?;
    let due_date: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    Ok(Task {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: parse_ts(&due_date),
        reminder_sent: row.get::<_, i32>(5)? != 0,
        created_at: parse_ts(&created_at),
    })
}

const TASK_COLUMNS: &str = "id, user_id, title, description, due_date, reminder_sent, created_at";

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let conn = self.conn.clone();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };

        let u = user.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let result = conn.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    u.id.to_string(),
                    u.username,
                    u.email,
                    u.password_hash,
                    ts_string(u.created_at),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateEmail(u.email))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE id = ?1",
                    params![id_str],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.clone();
        let email = email.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE email = ?1",
                    params![email],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let conn = self.conn.clone();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            due_date: new.due_date,
            reminder_sent: false,
            created_at: Utc::now(),
        };

        let t = task.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO tasks (id, user_id, title, description, due_date, reminder_sent, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    t.id.to_string(),
                    t.user_id.to_string(),
                    t.title,
                    t.description,
                    ts_string(t.due_date),
                    ts_string(t.created_at),
                ],
            )?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let task = conn
                .query_row(
                    &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                    params![id_str],
                    task_from_row,
                )
                .optional()?;
            Ok(task)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.clone();
        let user_id_str = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![user_id_str], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn query_due_tasks(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.clone();
        let lower = ts_string(now);
        let upper = ts_string(now + window);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE due_date >= ?1 AND due_date <= ?2 AND reminder_sent = 0
                 ORDER BY due_date ASC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![lower, upper], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    async fn mark_reminder_sent(&self, task_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let id_str = task_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            // Conditional update: only one caller can win the transition.
            let rows = conn.execute(
                "UPDATE tasks SET reminder_sent = 1 WHERE id = ?1 AND reminder_sent = 0",
                params![id_str],
            )?;
            Ok(rows > 0)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteTaskStore {
        SqliteTaskStore::new(dir.path().join("test.db"))
            .await
            .unwrap()
    }

    async fn seed_user(store: &SqliteTaskStore) -> User {
        store
            .create_user(NewUser {
                username: "nancy".to_string(),
                email: "nancy@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_and_fetch_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let user = seed_user(&store).await;

        let by_id = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "nancy@example.com");

        let by_email = store
            .get_user_by_email("nancy@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store).await;

        let err = store
            .create_user(NewUser {
                username: "other".to_string(),
                email: "nancy@example.com".to_string(),
                password_hash: "hash2".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn query_due_tasks_respects_window_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let user = seed_user(&store).await;
        let now = Utc::now();

        let in_window = store
            .create_task(NewTask {
                user_id: user.id,
                title: "in window".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(30),
            })
            .await
            .unwrap();
        // Past due: never retroactively notified
        store
            .create_task(NewTask {
                user_id: user.id,
                title: "overdue".to_string(),
                description: String::new(),
                due_date: now - Duration::minutes(5),
            })
            .await
            .unwrap();
        store
            .create_task(NewTask {
                user_id: user.id,
                title: "far future".to_string(),
                description: String::new(),
                due_date: now + Duration::hours(2),
            })
            .await
            .unwrap();
        let already_sent = store
            .create_task(NewTask {
                user_id: user.id,
                title: "already sent".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(15),
            })
            .await
            .unwrap();
        assert!(store.mark_reminder_sent(already_sent.id).await.unwrap());

        let due = store
            .query_due_tasks(now, Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, in_window.id);
    }

    #[tokio::test]
    async fn due_tasks_ordered_by_due_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let user = seed_user(&store).await;
        let now = Utc::now();

        for mins in [45, 10, 30] {
            store
                .create_task(NewTask {
                    user_id: user.id,
                    title: format!("due in {}m", mins),
                    description: String::new(),
                    due_date: now + Duration::minutes(mins),
                })
                .await
                .unwrap();
        }

        let due = store
            .query_due_tasks(now, Duration::hours(1))
            .await
            .unwrap();
        let titles: Vec<_> = due.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["due in 10m", "due in 30m", "due in 45m"]);
    }

    #[tokio::test]
    async fn mark_reminder_sent_claims_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let user = seed_user(&store).await;
        let task = store
            .create_task(NewTask {
                user_id: user.id,
                title: "t".to_string(),
                description: String::new(),
                due_date: Utc::now() + Duration::minutes(30),
            })
            .await
            .unwrap();

        assert!(store.mark_reminder_sent(task.id).await.unwrap());
        // Second attempt loses the claim
        assert!(!store.mark_reminder_sent(task.id).await.unwrap());

        let stored = store.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);
    }
}
