//! Polling loop that drives the change feed.
//!
//! One poller serves one subscription. Running a single poller keeps the
//! dispatch order identical to the change-log order.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use todofeed_core::{models::ChangeId, ChangeHandler, Clock};
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, TriggerError},
    source::ChangeSource,
};

/// Configuration for the change feed poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Maximum changes handed to subscribers per batch.
    pub batch_size: usize,

    /// Wait between polls when the change log is empty.
    pub polling_interval: Duration,

    /// How long a claimed batch stays reserved before it is handed out again.
    pub lease_duration: Duration,

    /// Wait before polling again after a source error.
    pub error_backoff: Duration,

    /// Maximum time to wait for the poller to stop.
    pub shutdown_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::DEFAULT_BATCH_SIZE,
            polling_interval: Duration::from_millis(crate::DEFAULT_POLLING_INTERVAL_MS),
            lease_duration: Duration::from_secs(crate::DEFAULT_LEASE_SECONDS),
            error_backoff: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl PollerConfig {
    /// Checks that the configuration can drive a poller.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Configuration` for a zero batch size or lease.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TriggerError::configuration("batch_size must be greater than 0"));
        }
        if self.lease_duration.is_zero() {
            return Err(TriggerError::configuration("lease_duration must be greater than 0"));
        }
        Ok(())
    }
}

/// Counters for monitoring the poller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Non-empty batches dispatched to subscribers.
    pub batches_processed: u64,
    /// Changes dispatched to subscribers.
    pub changes_processed: u64,
    /// Changes dispatched more than once because a lease expired.
    pub changes_redelivered: u64,
    /// Failed claim or acknowledge calls.
    pub source_errors: u64,
}

/// Claims changes from a [`ChangeSource`] and dispatches them to a
/// [`ChangeHandler`].
pub struct ChangeFeedPoller {
    source: Arc<dyn ChangeSource>,
    handler: Arc<dyn ChangeHandler>,
    config: PollerConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<PollerStats>>,
    cancellation_token: CancellationToken,
}

impl ChangeFeedPoller {
    /// Creates a poller. Nothing runs until [`run`](Self::run) or
    /// [`spawn`](Self::spawn) is called.
    pub fn new(
        source: Arc<dyn ChangeSource>,
        handler: Arc<dyn ChangeHandler>,
        config: PollerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            handler,
            config,
            clock,
            stats: Arc::new(RwLock::new(PollerStats::default())),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Returns the token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Returns a snapshot of the poller counters.
    pub async fn stats(&self) -> PollerStats {
        self.stats.read().await.clone()
    }

    /// Polls until cancelled.
    ///
    /// Empty polls wait `polling_interval`; source errors are logged and
    /// wait `error_backoff`. A full batch is followed immediately by the next
    /// claim so a backlog drains without pauses.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Configuration` if the configuration is invalid.
    /// Errors during polling never end the loop.
    pub async fn run(&self) -> Result<()> {
        self.config.validate()?;

        info!(
            batch_size = self.config.batch_size,
            polling_interval_ms = u64::try_from(self.config.polling_interval.as_millis()).unwrap_or(u64::MAX),
            "change feed poller starting"
        );

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            let wait = match self.process_batch().await {
                Ok(0) => Some(self.config.polling_interval),
                Ok(_) => None,
                Err(error) => {
                    error!(error = %error, "change feed poll failed");
                    Some(self.config.error_backoff)
                },
            };

            if let Some(wait) = wait {
                tokio::select! {
                    () = self.clock.sleep(wait) => {}
                    () = self.cancellation_token.cancelled() => break,
                }
            }
        }

        info!("change feed poller stopped");
        Ok(())
    }

    /// Runs exactly one claim, dispatch, and acknowledge cycle.
    ///
    /// Returns the number of changes dispatched.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Storage` if claiming or acknowledging fails.
    /// When acknowledging fails the batch has already been dispatched and
    /// will be dispatched again once its lease expires.
    pub async fn process_batch(&self) -> Result<usize> {
        let changes = match self
            .source
            .claim_batch(self.config.batch_size, self.config.lease_duration)
            .await
        {
            Ok(changes) => changes,
            Err(e) => {
                self.stats.write().await.source_errors += 1;
                return Err(TriggerError::storage(format!("failed to claim changes: {e}")));
            },
        };

        if changes.is_empty() {
            return Ok(0);
        }

        let redelivered = changes.iter().filter(|change| change.attempt_count > 1).count();
        if redelivered > 0 {
            warn!(redelivered, "dispatching changes whose lease expired");
        }

        debug!(
            batch_size = changes.len(),
            first_change_id = %changes[0].change_id,
            "dispatching change batch"
        );
        self.handler.handle_changes(&changes).await;

        let change_ids: Vec<ChangeId> = changes.iter().map(|change| change.change_id).collect();
        if let Err(e) = self.source.acknowledge(&change_ids).await {
            self.stats.write().await.source_errors += 1;
            return Err(TriggerError::storage(format!("failed to acknowledge changes: {e}")));
        }

        let mut stats = self.stats.write().await;
        stats.batches_processed += 1;
        stats.changes_processed += changes.len() as u64;
        stats.changes_redelivered += redelivered as u64;

        Ok(changes.len())
    }

    /// Runs the poller on a new task.
    pub fn spawn(self) -> PollerHandle {
        let cancellation_token = self.cancellation_token.clone();
        let stats = self.stats.clone();
        let shutdown_timeout = self.config.shutdown_timeout;

        let handle = tokio::spawn(async move {
            let result = self.run().await;
            if let Err(ref error) = result {
                error!(error = %error, "change feed poller terminated with error");
            }
            result
        });

        PollerHandle { cancellation_token, stats, shutdown_timeout, handle }
    }
}

/// Handle to a poller running on its own task.
pub struct PollerHandle {
    cancellation_token: CancellationToken,
    stats: Arc<RwLock<PollerStats>>,
    shutdown_timeout: Duration,
    handle: JoinHandle<Result<()>>,
}

impl PollerHandle {
    /// Returns a snapshot of the poller counters.
    pub async fn stats(&self) -> PollerStats {
        self.stats.read().await.clone()
    }

    /// Returns whether the poller task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the poller, letting an in-flight batch finish.
    ///
    /// Returns the final counters.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::ShutdownTimeout` if the poller does not stop in
    /// time, `TriggerError::PollerPanic` if it panicked, or the error the
    /// poller itself returned.
    pub async fn shutdown(self) -> Result<PollerStats> {
        info!(
            timeout_seconds = self.shutdown_timeout.as_secs(),
            "stopping change feed poller"
        );
        self.cancellation_token.cancel();

        match tokio::time::timeout(self.shutdown_timeout, self.handle).await {
            Ok(Ok(result)) => {
                result?;
                Ok(self.stats.read().await.clone())
            },
            Ok(Err(join_error)) => Err(TriggerError::PollerPanic { error: join_error.to_string() }),
            Err(_elapsed) => {
                error!("change feed poller did not stop in time");
                Err(TriggerError::ShutdownTimeout { timeout: self.shutdown_timeout })
            },
        }
    }
}
