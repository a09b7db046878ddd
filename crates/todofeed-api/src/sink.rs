//! Durable output sink for ingested to-do items.
//!
//! The ingress handler only knows the [`TodoSink`] trait. Production wiring
//! passes a [`PostgresTodoSink`]; tests pass [`mock::MockTodoSink`].

use std::{future::Future, pin::Pin, sync::Arc};

use todofeed_core::{error::Result, models::ToDoItem, storage::Storage};

/// Destination that persists to-do items.
pub trait TodoSink: Send + Sync + 'static {
    /// Writes the full record, replacing any existing row with the same id.
    fn write<'a>(&'a self, item: &'a ToDoItem) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Verifies the sink can accept writes.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Sink that upserts into the `todo` table.
pub struct PostgresTodoSink {
    storage: Arc<Storage>,
}

impl PostgresTodoSink {
    /// Creates a sink writing through `storage`.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl TodoSink for PostgresTodoSink {
    fn write<'a>(&'a self, item: &'a ToDoItem) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { self.storage.todo_items.upsert(item).await })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.storage.health_check().await })
    }
}

pub mod mock {
    //! In-memory sink for testing.

    use std::{future::Future, pin::Pin, sync::Arc};

    use todofeed_core::{
        error::{CoreError, Result},
        models::ToDoItem,
    };
    use tokio::sync::RwLock;

    use super::TodoSink;

    #[derive(Debug, Default)]
    struct State {
        writes: Vec<ToDoItem>,
        failure: Option<String>,
    }

    /// Mock sink that records every successful write.
    #[derive(Debug, Clone, Default)]
    pub struct MockTodoSink {
        state: Arc<RwLock<State>>,
    }

    impl MockTodoSink {
        /// Creates an empty sink.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every following write and health check fail with `message`.
        pub async fn fail_with(&self, message: impl Into<String>) {
            self.state.write().await.failure = Some(message.into());
        }

        /// Makes the sink accept writes again.
        pub async fn recover(&self) {
            self.state.write().await.failure = None;
        }

        /// Returns every item written, in write order.
        pub async fn writes(&self) -> Vec<ToDoItem> {
            self.state.read().await.writes.clone()
        }
    }

    impl TodoSink for MockTodoSink {
        fn write<'a>(
            &'a self,
            item: &'a ToDoItem,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                let mut state = self.state.write().await;
                if let Some(message) = &state.failure {
                    return Err(CoreError::Database(message.clone()));
                }
                state.writes.push(item.clone());
                Ok(())
            })
        }

        fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                match &self.state.read().await.failure {
                    Some(message) => Err(CoreError::Database(message.clone())),
                    None => Ok(()),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use todofeed_core::models::ToDoId;

    use super::{mock::MockTodoSink, *};

    fn item(title: &str) -> ToDoItem {
        ToDoItem {
            id: ToDoId::new(),
            order: Some(1),
            title: title.to_string(),
            url: "https://example.com/todo".to_string(),
            completed: Some(false),
        }
    }

    #[tokio::test]
    async fn mock_records_writes_in_order() {
        let sink = MockTodoSink::new();
        let first = item("first");
        let second = item("second");

        sink.write(&first).await.unwrap();
        sink.write(&second).await.unwrap();

        assert_eq!(sink.writes().await, vec![first, second]);
    }

    #[tokio::test]
    async fn failing_mock_rejects_writes_until_recovered() {
        let sink = MockTodoSink::new();
        sink.fail_with("disk full").await;

        assert!(sink.write(&item("lost")).await.is_err());
        assert!(sink.health_check().await.is_err());
        assert!(sink.writes().await.is_empty());

        sink.recover().await;
        sink.write(&item("kept")).await.unwrap();
        assert_eq!(sink.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn postgres_sink_can_be_created_without_connecting() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/todofeed").unwrap();
        let _sink = PostgresTodoSink::new(Arc::new(Storage::new(pool)));
    }
}
