//! HTTP request handlers.
//!
//! - `todo` - ingress endpoint that writes a to-do item and echoes it
//! - `health` - health, readiness, and liveness probes
//!
//! Failures are returned as `{"error": {"code": ..., "message": ...}}` with
//! codes from the `TodoError` taxonomy.

pub mod health;
pub mod todo;

pub use health::{health_check, liveness_check, readiness_check};
pub use todo::create_todo;
