//! todofeed service.
//!
//! Runs the to-do ingress endpoint and the `todo` change feed in one process.
//! Initializes all subsystems and coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use todofeed_api::{AppState, Config, PostgresTodoSink};
use todofeed_core::{storage::Storage, Clock, MulticastChangeHandler, RealClock};
use todofeed_trigger::{ChangeFeedPoller, LoggingChangeHandler, PostgresChangeSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log)?;

    info!("Starting todofeed");
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    let storage = Arc::new(Storage::new(db_pool.clone()));
    storage.migrate().await.context("Failed to apply database schema")?;
    info!("Database schema ready");

    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());

    let mut subscribers = MulticastChangeHandler::new();
    subscribers.add_subscriber(Arc::new(LoggingChangeHandler::new()));
    info!(subscribers = subscribers.subscriber_count(), "Change subscribers registered");

    let poller = ChangeFeedPoller::new(
        Arc::new(PostgresChangeSource::new(storage.clone())),
        Arc::new(subscribers),
        config.to_poller_config(),
        clock.clone(),
    )
    .spawn();

    let shutdown = CancellationToken::new();
    let addr = config.bind_addr()?;
    let state = AppState::new(Arc::new(PostgresTodoSink::new(storage)), clock);
    let mut server_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        let request_timeout = config.request_timeout();
        async move {
            if let Err(e) = todofeed_api::start_server(state, addr, request_timeout, shutdown).await {
                error!(error = %e, "Server failed");
            }
        }
    });

    info!(addr = %addr, "todofeed is ready to receive requests");

    let server_finished = tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received, starting graceful shutdown");
            false
        },
        _ = &mut server_handle => {
            warn!("Server exited unexpectedly, shutting down");
            true
        },
    };

    shutdown.cancel();

    if !server_finished {
        warn!(
            grace_period_seconds = SHUTDOWN_GRACE_PERIOD.as_secs(),
            "Waiting for in-flight requests to complete"
        );
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, server_handle).await.is_err() {
            info!("Shutdown grace period expired");
        } else {
            info!("Server stopped");
        }
    }

    match poller.shutdown().await {
        Ok(stats) => info!(
            batches = stats.batches_processed,
            changes = stats.changes_processed,
            redelivered = stats.changes_redelivered,
            source_errors = stats.source_errors,
            "Change feed stopped"
        ),
        Err(e) => error!(error = %e, "Change feed did not stop cleanly"),
    }

    db_pool.close().await;
    info!("Database connections closed");

    info!("todofeed shutdown complete");
    Ok(())
}

/// Installs the global tracing subscriber.
fn init_tracing(directives: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(directives).context("Invalid RUST_LOG directives")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.database_acquire_timeout())
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        () = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
