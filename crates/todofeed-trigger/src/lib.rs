//! Change feed for the `todo` table.
//!
//! Polls the change log maintained by the database trigger, hands each
//! claimed batch to the registered [`ChangeHandler`] subscribers, and
//! acknowledges the batch once they return.
//!
//! # Architecture
//!
//! 1. **Claim** - lease up to `batch_size` changes, oldest first
//! 2. **Dispatch** - pass the batch, in order, to the subscribers
//! 3. **Acknowledge** - remove the batch from the change log
//!
//! A poller that stops between steps 1 and 3 leaves the lease to expire, and
//! the batch is handed out again. Delivery is therefore at-least-once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use todofeed_core::{storage::Storage, MulticastChangeHandler, RealClock};
//! use todofeed_trigger::{ChangeFeedPoller, LoggingChangeHandler, PollerConfig, PostgresChangeSource};
//!
//! # async fn example(pool: sqlx::PgPool) {
//! let mut handlers = MulticastChangeHandler::new();
//! handlers.add_subscriber(Arc::new(LoggingChangeHandler::new()));
//!
//! let source = Arc::new(PostgresChangeSource::new(Arc::new(Storage::new(pool))));
//! let poller = ChangeFeedPoller::new(
//!     source,
//!     Arc::new(handlers),
//!     PollerConfig::default(),
//!     Arc::new(RealClock::new()),
//! );
//! let running = poller.spawn();
//! # let _ = running;
//! # }
//! ```
//!
//! [`ChangeHandler`]: todofeed_core::ChangeHandler

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handler;
pub mod poller;
pub mod source;

pub use error::{Result, TriggerError};
pub use handler::{describe_change, LoggingChangeHandler};
pub use poller::{ChangeFeedPoller, PollerConfig, PollerHandle, PollerStats};
pub use source::{ChangeSource, PostgresChangeSource};

/// Default maximum number of changes per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default delay between polls when the change log is empty, in milliseconds.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// Default lease on a claimed batch, in seconds.
pub const DEFAULT_LEASE_SECONDS: u64 = 60;
