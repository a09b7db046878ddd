//! Core domain models and change notification types.
//!
//! Provides the to-do record, its strongly-typed identifiers, the change
//! notification shape delivered by the table change feed, error handling, and
//! PostgreSQL storage shared by the ingress and trigger crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result, TodoError};
pub use events::{ChangeHandler, MulticastChangeHandler, NoOpChangeHandler};
pub use models::{ChangeId, ItemChange, NewToDoItem, Operation, ToDoId, ToDoItem};
pub use time::{Clock, RealClock, TestClock};
