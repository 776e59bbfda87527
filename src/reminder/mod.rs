//! Due-task reminders: scan, dispatch, and the recurring scheduler.
//!
//! A task is eligible when its due date falls inside the lookahead window
//! and its reminder has not been sent. Dispatching a task resolves the
//! owner, sends the mail, and only then persists `reminder_sent`, so a
//! failed send leaves the task eligible for the next tick. The same
//! dispatch routine serves the scheduler tick and the one-shot send at
//! task creation.

mod scheduler;

pub use scheduler::ReminderScheduler;

use crate::notify::{Notifier, NotifyError};
use crate::store::{StoreError, Task, TaskStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification failed for task {task_id}: {source}")]
    Notify {
        task_id: Uuid,
        #[source]
        source: NotifyError,
    },

    #[error("owner {user_id} of task {task_id} not found")]
    UserNotFound { task_id: Uuid, user_id: Uuid },

    #[error("reminder for task {0} already sent")]
    AlreadySent(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Acknowledgment of a successfully dispatched reminder.
#[derive(Debug, Clone)]
pub struct Sent {
    pub task_id: Uuid,
    pub to_email: String,
}

/// Outcome counts for one scheduler tick.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct TickSummary {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderService {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    window: Duration,
}

impl ReminderService {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>, window: Duration) -> Self {
        Self {
            store,
            notifier,
            window,
        }
    }

    /// Tasks due within `[now, now + window]` with the reminder still
    /// unsent, ascending by due date. Read-only; an empty result is the
    /// normal case. Tasks already overdue before `now` are never returned
    /// (missed reminders are skipped, not sent late).
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        self.store.query_due_tasks(now, self.window).await
    }

    /// Send the reminder for one task and persist the sent-flag.
    ///
    /// The flag is written only after the notifier acknowledged the send,
    /// and the write is conditional, so the flag transitions false -> true
    /// at most once even under concurrent dispatchers. Any failure before
    /// the write leaves the task eligible for the next tick.
    pub async fn dispatch(&self, task: &Task) -> Result<Sent, DispatchError> {
        // Re-read the flag: the caller's snapshot may be stale.
        let current = self.store.get_task(task.id).await?;
        if current.map(|t| t.reminder_sent).unwrap_or(false) {
            return Err(DispatchError::AlreadySent(task.id));
        }

        let owner = self
            .store
            .get_user(task.user_id)
            .await?
            .ok_or(DispatchError::UserNotFound {
                task_id: task.id,
                user_id: task.user_id,
            })?;

        let subject = "Reminder: Task due soon";
        let body = format!(
            "<strong>Your task {} is due on {}</strong>",
            task.title,
            task.due_date.to_rfc3339()
        );

        self.notifier
            .send(&owner.email, subject, &body)
            .await
            .map_err(|source| DispatchError::Notify {
                task_id: task.id,
                source,
            })?;

        if !self.store.mark_reminder_sent(task.id).await? {
            // Another dispatcher claimed the flag between our check and the
            // send acknowledgment. The mail went out; nothing to roll back.
            tracing::warn!(task_id = %task.id, "sent-flag already claimed after send");
        }

        Ok(Sent {
            task_id: task.id,
            to_email: owner.email,
        })
    }

    /// One scan-and-dispatch cycle. Notification and user-resolution
    /// failures are logged per task and do not abort the rest of the batch;
    /// a store failure, whether during the scan or while reading or marking
    /// a task, aborts the whole tick (retried on the next interval).
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
        let tasks = self.scan(now).await?;
        let mut summary = TickSummary {
            scanned: tasks.len(),
            ..TickSummary::default()
        };

        for task in &tasks {
            match self.dispatch(task).await {
                Ok(sent) => {
                    tracing::info!(task_id = %sent.task_id, to = %sent.to_email, "reminder sent");
                    summary.sent += 1;
                }
                Err(DispatchError::AlreadySent(id)) => {
                    tracing::debug!(task_id = %id, "reminder already sent, skipping");
                }
                Err(DispatchError::Notify { task_id, source }) => {
                    tracing::warn!(
                        %task_id,
                        error = %source,
                        transient = source.is_transient(),
                        "reminder notification failed, task stays eligible"
                    );
                    summary.failed += 1;
                }
                Err(DispatchError::Store(e)) => {
                    tracing::warn!(task_id = %task.id, error = %e, "store unreachable mid-tick, aborting");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "reminder dispatch failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::store::{InMemoryTaskStore, NewTask, NewUser, User};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        async fn sent_count(&self) -> usize {
            self.sent.lock().await.len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            to_email: &str,
            subject: &str,
            _body: &str,
        ) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Transport("injected failure".to_string()));
            }
            self.sent
                .lock()
                .await
                .push((to_email.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<InMemoryTaskStore>,
        notifier: Arc<RecordingNotifier>,
        service: ReminderService,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryTaskStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = ReminderService::new(
            store.clone(),
            notifier.clone(),
            Duration::hours(1),
        );
        let user = store
            .create_user(NewUser {
                username: "nancy".to_string(),
                email: "nancy@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        Fixture {
            store,
            notifier,
            service,
            user,
        }
    }

    async fn task_due_in(fx: &Fixture, now: DateTime<Utc>, delta: Duration, title: &str) -> Task {
        fx.store
            .create_task(NewTask {
                user_id: fx.user.id,
                title: title.to_string(),
                description: String::new(),
                due_date: now + delta,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scan_window_scenario() {
        // now=10:00, window=1h: A due 10:30 in; B due 12:00 out; C due 10:15
        // but already sent, out.
        let fx = fixture().await;
        let now = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);

        let a = task_due_in(&fx, now, Duration::minutes(30), "A").await;
        task_due_in(&fx, now, Duration::hours(2), "B").await;
        let c = task_due_in(&fx, now, Duration::minutes(15), "C").await;
        assert!(fx.store.mark_reminder_sent(c.id).await.unwrap());

        let due = fx.service.scan(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, a.id);
    }

    #[tokio::test]
    async fn scan_excludes_overdue_tasks() {
        let fx = fixture().await;
        let now = Utc::now();
        task_due_in(&fx, now, Duration::minutes(-10), "overdue").await;

        assert!(fx.service.scan(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_sends_and_marks() {
        let fx = fixture().await;
        let now = Utc::now();
        let task = task_due_in(&fx, now, Duration::minutes(30), "t").await;

        let sent = fx.service.dispatch(&task).await.unwrap();
        assert_eq!(sent.to_email, "nancy@example.com");
        assert_eq!(fx.notifier.sent_count().await, 1);

        let stored = fx.store.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);
    }

    #[tokio::test]
    async fn dispatch_twice_sends_once() {
        let fx = fixture().await;
        let now = Utc::now();
        let task = task_due_in(&fx, now, Duration::minutes(30), "t").await;

        fx.service.dispatch(&task).await.unwrap();
        // Second call carries the stale (unsent) snapshot; the fresh flag
        // read must stop it.
        let err = fx.service.dispatch(&task).await.unwrap_err();
        assert!(matches!(err, DispatchError::AlreadySent(_)));
        assert_eq!(fx.notifier.sent_count().await, 1);
    }

    #[tokio::test]
    async fn failed_send_leaves_task_eligible() {
        let fx = fixture().await;
        let now = Utc::now();
        let task = task_due_in(&fx, now, Duration::minutes(30), "t").await;

        fx.notifier.set_failing(true);
        let err = fx.service.dispatch(&task).await.unwrap_err();
        assert!(matches!(err, DispatchError::Notify { .. }));

        let stored = fx.store.get_task(task.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent);
        // Next tick re-includes it and a recovered notifier sends exactly one.
        fx.notifier.set_failing(false);
        let summary = fx.service.run_tick(now).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(fx.notifier.sent_count().await, 1);
    }

    #[tokio::test]
    async fn missing_owner_skipped_not_marked() {
        let fx = fixture().await;
        let now = Utc::now();
        let task = fx
            .store
            .create_task(NewTask {
                user_id: Uuid::new_v4(),
                title: "orphan".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(30),
            })
            .await
            .unwrap();

        let err = fx.service.dispatch(&task).await.unwrap_err();
        assert!(matches!(err, DispatchError::UserNotFound { .. }));
        assert_eq!(fx.notifier.sent_count().await, 0);

        let stored = fx.store.get_task(task.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent);
    }

    #[tokio::test]
    async fn tick_survives_individual_failures() {
        let fx = fixture().await;
        let now = Utc::now();
        task_due_in(&fx, now, Duration::minutes(10), "ok").await;
        // Orphaned task fails user resolution but must not block the batch
        fx.store
            .create_task(NewTask {
                user_id: Uuid::new_v4(),
                title: "orphan".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(20),
            })
            .await
            .unwrap();
        task_due_in(&fx, now, Duration::minutes(30), "ok too").await;

        let summary = fx.service.run_tick(now).await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
    }

    /// Wraps the in-memory store and fails the sent-flag write on demand.
    struct FlakyStore {
        inner: InMemoryTaskStore,
        fail_marks: AtomicBool,
    }

    #[async_trait]
    impl TaskStore for FlakyStore {
        fn is_persistent(&self) -> bool {
            false
        }

        async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
            self.inner.create_user(new).await
        }

        async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.get_user(id).await
        }

        async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.inner.get_user_by_email(email).await
        }

        async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
            self.inner.create_task(new).await
        }

        async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
            self.inner.get_task(id).await
        }

        async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks_for_user(user_id).await
        }

        async fn query_due_tasks(
            &self,
            now: DateTime<Utc>,
            window: Duration,
        ) -> Result<Vec<Task>, StoreError> {
            self.inner.query_due_tasks(now, window).await
        }

        async fn mark_reminder_sent(&self, task_id: Uuid) -> Result<bool, StoreError> {
            if self.fail_marks.load(Ordering::SeqCst) {
                return Err(StoreError::Database("injected mark failure".to_string()));
            }
            self.inner.mark_reminder_sent(task_id).await
        }
    }

    #[tokio::test]
    async fn store_failure_during_mark_aborts_tick() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryTaskStore::new(),
            fail_marks: AtomicBool::new(true),
        });
        let notifier = Arc::new(RecordingNotifier::new());
        let service = ReminderService::new(
            store.clone(),
            notifier.clone(),
            Duration::hours(1),
        );
        let user = store
            .create_user(NewUser {
                username: "nancy".to_string(),
                email: "nancy@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let now = Utc::now();
        let first = store
            .create_task(NewTask {
                user_id: user.id,
                title: "first".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(10),
            })
            .await
            .unwrap();
        let second = store
            .create_task(NewTask {
                user_id: user.id,
                title: "second".to_string(),
                description: String::new(),
                due_date: now + Duration::minutes(20),
            })
            .await
            .unwrap();

        let err = service.run_tick(now).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        // The batch stopped at the failed write: the second task was never
        // attempted, and neither flag advanced.
        assert_eq!(notifier.sent_count().await, 1);
        assert!(!store.get_task(first.id).await.unwrap().unwrap().reminder_sent);
        assert!(!store.get_task(second.id).await.unwrap().unwrap().reminder_sent);

        // A healthy store on the next tick delivers both.
        store.fail_marks.store(false, Ordering::SeqCst);
        let summary = service.run_tick(now).await.unwrap();
        assert_eq!(summary.sent, 2);
    }

    #[tokio::test]
    async fn consecutive_ticks_never_double_send() {
        let fx = fixture().await;
        let now = Utc::now();
        task_due_in(&fx, now, Duration::minutes(30), "t").await;

        let first = fx.service.run_tick(now).await.unwrap();
        let second = fx.service.run_tick(now).await.unwrap();
        assert_eq!(first.sent, 1);
        assert_eq!(second.scanned, 0);
        assert_eq!(fx.notifier.sent_count().await, 1);
    }
}
