use std::time::Duration;

use anyhow::Result;

use fieldops_app::bootstrap;
use fieldops_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use fieldops_core::config::LogFormat::{Compact, Json, Pretty};
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let sweep_interval = Duration::from_secs(app.config.sweep.interval_secs);
    let sweep_handle = app.sweep.clone().spawn(sweep_interval);

    tracing::info!(
        event_name = "system.app.started",
        sweep_interval_secs = app.config.sweep.interval_secs,
        notifications_enabled = app.config.notifications.enabled,
        "fieldops daemon started"
    );

    wait_for_shutdown().await?;

    tracing::info!(event_name = "system.app.stopping", "fieldops daemon stopping");
    sweep_handle.abort();
    if let Some(worker) = app.dispatch_worker {
        worker.abort();
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
