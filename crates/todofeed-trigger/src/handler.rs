//! Change subscriber that writes one log line per row change.

use todofeed_core::{models::ItemChange, ChangeHandler};
use tracing::info;

/// Logs every change in a batch, in order.
///
/// Each change produces exactly one `info` event whose message carries the
/// operation kind and the item's `id`, `title`, `url`, and `completed` values.
/// Nothing about one entry can stop the entries after it from being logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingChangeHandler;

impl LoggingChangeHandler {
    /// Creates a new logging handler.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ChangeHandler for LoggingChangeHandler {
    async fn handle_changes(&self, changes: &[ItemChange]) {
        for change in changes {
            info!(
                change_id = %change.change_id,
                operation = %change.operation,
                item_id = %change.item.id,
                "{}",
                describe_change(change)
            );
        }
    }
}

/// Renders the human-readable line logged for a change.
///
/// Control characters in `title` and `url` are escaped so the result always
/// fits on one line. An unknown completion state renders as `null`.
///
/// ```
/// use todofeed_core::models::{ChangeId, ItemChange, Operation, ToDoId, ToDoItem};
/// use todofeed_trigger::describe_change;
///
/// let item = ToDoItem {
///     id: ToDoId(uuid::Uuid::nil()),
///     order: None,
///     title: "Buy milk".to_string(),
///     url: "https://example.com".to_string(),
///     completed: Some(true),
/// };
/// let line = describe_change(&ItemChange::new(ChangeId(1), Operation::Insert, item));
///
/// assert_eq!(
///     line,
///     "Change operation: Insert, Id: 00000000-0000-0000-0000-000000000000, \
///      Title: Buy milk, Url: https://example.com, Completed: true"
/// );
/// ```
pub fn describe_change(change: &ItemChange) -> String {
    let item = &change.item;
    let completed = item.completed.map_or_else(|| "null".to_string(), |c| c.to_string());

    format!(
        "Change operation: {}, Id: {}, Title: {}, Url: {}, Completed: {}",
        change.operation,
        item.id,
        escape_controls(&item.title),
        escape_controls(&item.url),
        completed
    )
}

/// Escapes control characters and passes every other character through.
fn escape_controls(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() {
            escaped.extend(c.escape_default());
        } else {
            escaped.push(c);
        }
    }
    escaped
}
