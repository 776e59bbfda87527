//! HTTP route handlers and server wiring.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::notify::SendGridMailer;
use crate::reminder::{ReminderScheduler, ReminderService, TickSummary};
use crate::store::{SqliteTaskStore, TaskStore};

use super::auth;
use super::tasks;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TaskStore>,
    /// Dispatch routine shared by the scheduler and the creation endpoint
    pub reminders: Arc<ReminderService>,
    /// Recurring scheduler; also serves the manual trigger endpoint
    pub scheduler: Arc<ReminderScheduler>,
}

/// Start the HTTP server and the reminder scheduler.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn TaskStore> =
        Arc::new(SqliteTaskStore::new(config.database_path.clone()).await?);

    let notifier = Arc::new(SendGridMailer::new(
        config.sendgrid_api_key.clone(),
        config.mail_from.clone(),
        Duration::from_secs(config.reminder.notify_timeout_secs),
    ));

    let reminders = Arc::new(ReminderService::new(
        Arc::clone(&store),
        notifier,
        chrono::Duration::seconds(config.reminder.window_secs as i64),
    ));

    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::clone(&reminders),
        Duration::from_secs(config.reminder.interval_secs),
    ));
    scheduler.start().await;

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        reminders,
        scheduler: Arc::clone(&scheduler),
    });

    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/tasks", post(tasks::create_task))
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/:id", get(tasks::get_task))
        .route("/api/reminders/run", post(run_reminders))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Stop the scheduler on orderly shutdown; the in-flight tick finishes
    // first, and anything undelivered stays eligible for the next start.
    let shutdown_scheduler = Arc::clone(&scheduler);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_scheduler.stop().await;
        })
        .await?;

    Ok(())
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Trigger one reminder pass immediately. Runs under the scheduler's tick
/// guard, so it can never overlap a scheduled pass.
async fn run_reminders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TickSummary>, (StatusCode, String)> {
    state
        .scheduler
        .run_tick_now()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "persistent_store": state.store.is_persistent(),
    }))
}
