//! Recurring reminder scheduler.
//!
//! One process-wide background task ticks on a fixed interval for the
//! lifetime of the process. Ticks are serialized by an async guard: a new
//! tick never starts scanning while a previous batch is still in flight.
//! The scheduler survives tick failures indefinitely; a failed tick is
//! logged and retried on the next interval.

use super::{ReminderService, TickSummary};
use crate::store::StoreError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct ReminderScheduler {
    service: Arc<ReminderService>,
    interval: Duration,
    tick_guard: Arc<Mutex<()>>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(service: Arc<ReminderService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            tick_guard: Arc::new(Mutex::new(())),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the background tick loop. Idempotent: calling `start` while
    /// the loop is already running does nothing.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return;
        }

        let service = Arc::clone(&self.service);
        let tick_guard = Arc::clone(&self.tick_guard);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the first reminder pass should
            // wait a full period.
            ticker.tick().await;

            tracing::info!(interval_secs = interval.as_secs(), "reminder scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("reminder scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _guard = tick_guard.lock().await;
                        match service.run_tick(Utc::now()).await {
                            Ok(summary) if summary.scanned > 0 => {
                                tracing::info!(
                                    scanned = summary.scanned,
                                    sent = summary.sent,
                                    failed = summary.failed,
                                    "reminder tick complete"
                                );
                            }
                            Ok(_) => {
                                tracing::debug!("reminder tick complete, no tasks due");
                            }
                            Err(e) => {
                                // Store unreachable: the whole tick is
                                // abandoned and retried next interval.
                                tracing::warn!(error = %e, "reminder tick aborted");
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Run one tick immediately, under the same guard as the background
    /// loop, so a manual pass can never overlap a scheduled one. Serves the
    /// manual trigger endpoint.
    pub async fn run_tick_now(&self) -> Result<TickSummary, StoreError> {
        let _guard = self.tick_guard.lock().await;
        self.service.run_tick(Utc::now()).await
    }

    /// Signal shutdown and wait for the loop to finish. The in-flight tick,
    /// if any, completes before the loop exits its guard and observes the
    /// signal; at most one pending tick's notifications are lost, and those
    /// tasks stay eligible for the next process start.
    pub async fn stop(&self) {
        self.shutdown.notify_waiters();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            // Wake the loop in case notify_waiters raced the select arm.
            self.shutdown.notify_one();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "reminder scheduler task panicked");
                }
            }
        }
    }
}
