//! # taskdue
//!
//! Task manager with due-date email reminders.
//!
//! This library provides:
//! - HTTP APIs for registration, login, and task management
//! - A persistence layer over SQLite (with an in-memory backend for tests)
//! - A recurring reminder scheduler that scans for tasks due soon and
//!   emails the owner exactly once per task
//!
//! ## Reminder flow
//! 1. The scheduler ticks on a fixed interval (default every 10 minutes)
//! 2. The scan selects unsent tasks due within the lookahead window (default 1 hour)
//! 3. Each task is dispatched: owner resolved, mail sent, sent-flag persisted
//!
//! The same dispatch routine also runs once, inline, when a task is created.
//!
//! ## Modules
//! - `store`: user/task persistence backends
//! - `notify`: outbound mail (SendGrid)
//! - `reminder`: scan, dispatch, and the recurring scheduler
//! - `api`: axum HTTP layer

pub mod api;
pub mod auth_hash;
pub mod config;
pub mod notify;
pub mod reminder;
pub mod store;

pub use config::Config;
pub use reminder::{ReminderScheduler, ReminderService};
pub use store::{SqliteTaskStore, TaskStore};
