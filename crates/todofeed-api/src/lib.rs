//! HTTP surface of todofeed.
//!
//! Serves the to-do ingress endpoint and health probes, and owns the layered
//! service configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use todofeed_core::Clock;

pub mod config;
pub mod handlers;
pub mod server;
pub mod sink;

pub use config::Config;
pub use server::{create_router, start_server};
pub use sink::{PostgresTodoSink, TodoSink};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Destination for ingested items.
    pub sink: Arc<dyn TodoSink>,
    /// Time source for health reports.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates application state from its dependencies.
    pub fn new(sink: Arc<dyn TodoSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }
}
