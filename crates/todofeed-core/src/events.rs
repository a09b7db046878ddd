//! Change notification dispatch contracts.
//!
//! Subscribers implement [`ChangeHandler`] and are registered explicitly with
//! a [`MulticastChangeHandler`], which the change-feed poller calls once per
//! claimed batch.
//!
//! ```text
//! ┌──────────────────┐   batch of ItemChange   ┌─────────────────────────┐
//! │ ChangeFeedPoller │ ──────────────────────▶ │ MulticastChangeHandler  │
//! └──────────────────┘                         └─────────────────────────┘
//!                                                 │             │
//!                                                 ▼             ▼
//!                                       LoggingChangeHandler   (others)
//! ```

use std::sync::Arc;

use crate::models::ItemChange;

/// Receives batches of row changes from the change feed.
///
/// Batches arrive in change-log order and must be processed in that order.
/// Handlers have no failure path: a problem with one entry must not prevent
/// the remaining entries from being processed.
#[async_trait::async_trait]
pub trait ChangeHandler: Send + Sync + std::fmt::Debug {
    /// Handles one batch of changes.
    async fn handle_changes(&self, changes: &[ItemChange]);
}

/// Handler that discards every batch.
#[derive(Debug, Default)]
pub struct NoOpChangeHandler;

impl NoOpChangeHandler {
    /// Creates a new no-op handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ChangeHandler for NoOpChangeHandler {
    async fn handle_changes(&self, _changes: &[ItemChange]) {}
}

/// Forwards each batch to every registered subscriber.
///
/// Every subscriber sees the full batch in change-log order. Subscribers
/// run concurrently with one another.
#[derive(Debug, Clone, Default)]
pub struct MulticastChangeHandler {
    handlers: Vec<Arc<dyn ChangeHandler>>,
}

impl MulticastChangeHandler {
    /// Creates a handler with no subscribers.
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Registers a subscriber.
    pub fn add_subscriber(&mut self, handler: Arc<dyn ChangeHandler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait::async_trait]
impl ChangeHandler for MulticastChangeHandler {
    async fn handle_changes(&self, changes: &[ItemChange]) {
        let futures = self.handlers.iter().map(|handler| handler.handle_changes(changes));
        futures::future::join_all(futures).await;
    }
}
