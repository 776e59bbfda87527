//! taskdue - HTTP Server Entry Point
//!
//! Starts the HTTP server and the background reminder scheduler.

use taskdue::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdue=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: db={}, reminder interval={}s, window={}s",
        config.database_path.display(),
        config.reminder.interval_secs,
        config.reminder.window_secs
    );

    // Start HTTP server (owns the reminder scheduler lifecycle)
    api::serve(config).await?;

    Ok(())
}
