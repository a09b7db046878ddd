//! Error types for the change feed.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for change feed operations.
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors raised while polling the change log.
///
/// Subscribers never see these; the poller logs them and retries.
#[derive(Debug, Clone, Error)]
pub enum TriggerError {
    /// Claiming or acknowledging changes failed.
    #[error("change source error: {message}")]
    Storage {
        /// Error message from the source
        message: String,
    },

    /// Poller configuration is unusable.
    #[error("invalid poller configuration: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// The poller did not stop within the shutdown timeout.
    #[error("poller did not stop within {timeout:?}")]
    ShutdownTimeout {
        /// How long shutdown waited
        timeout: Duration,
    },

    /// The poller task panicked.
    #[error("poller task panicked: {error}")]
    PollerPanic {
        /// Join error description
        error: String,
    },
}

impl TriggerError {
    /// Creates a change source error from a message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Creates a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}
