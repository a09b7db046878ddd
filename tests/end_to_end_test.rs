//! End-to-end flow with in-memory backends.
//!
//! A request posted to the ingress route lands in a table stand-in that
//! records row changes the way the database trigger does. The change feed
//! then picks those changes up and hands them to its subscribers.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, atomic::Ordering, Arc},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
};
use serde_json::json;
use todofeed_api::{create_router, handlers::todo::ROUTE, AppState, TodoSink};
use todofeed_core::{
    error::Result,
    models::{ChangeId, ItemChange, Operation, ToDoId, ToDoItem},
    ChangeHandler, MulticastChangeHandler, TestClock,
};
use todofeed_trigger::{
    describe_change, source::mock::MockChangeSource, ChangeFeedPoller, LoggingChangeHandler,
    PollerConfig,
};
use tokio::sync::Mutex;
use tower::ServiceExt;

/// Table stand-in that appends a change for every upsert.
struct RecordingTable {
    rows: Mutex<HashMap<ToDoId, ToDoItem>>,
    changes: MockChangeSource,
    next_change_id: AtomicI64,
}

impl RecordingTable {
    fn new(changes: MockChangeSource) -> Self {
        Self { rows: Mutex::new(HashMap::new()), changes, next_change_id: AtomicI64::new(1) }
    }
}

impl TodoSink for RecordingTable {
    fn write<'a>(&'a self, item: &'a ToDoItem) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let previous = self.rows.lock().await.insert(item.id, item.clone());
            let operation = if previous.is_some() { Operation::Update } else { Operation::Insert };
            let change_id = ChangeId(self.next_change_id.fetch_add(1, Ordering::SeqCst));
            let mut change = ItemChange::new(change_id, operation, item.clone());
            change.attempt_count = 0;
            self.changes.push(change).await;
            Ok(())
        })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Default)]
struct DescribingHandler {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl ChangeHandler for DescribingHandler {
    async fn handle_changes(&self, changes: &[ItemChange]) {
        self.lines.lock().await.extend(changes.iter().map(describe_change));
    }
}

async fn post(app: axum::Router, body: serde_json::Value) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri(ROUTE)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn posted_items_reach_change_subscribers_in_order() {
    let changes = MockChangeSource::new();
    let table = Arc::new(RecordingTable::new(changes.clone()));
    let clock = Arc::new(TestClock::new());
    let app = create_router(AppState::new(table, clock.clone()), Duration::from_secs(30));

    let id = "0b6a3f52-8d1e-4f7a-9c3b-2e5d7a1f4c90";
    let created = json!({ "id": id, "title": "Buy milk", "url": "https://example.com/milk" });
    let completed = json!({
        "id": id,
        "order": 1,
        "title": "Buy milk",
        "url": "https://example.com/milk",
        "completed": true
    });
    assert_eq!(post(app.clone(), created).await, StatusCode::OK);
    assert_eq!(post(app, completed).await, StatusCode::OK);

    let describing = Arc::new(DescribingHandler::default());
    let mut subscribers = MulticastChangeHandler::new();
    subscribers.add_subscriber(Arc::new(LoggingChangeHandler::new()));
    subscribers.add_subscriber(describing.clone());
    let poller = ChangeFeedPoller::new(
        Arc::new(changes.clone()),
        Arc::new(subscribers),
        PollerConfig::default(),
        clock,
    );

    assert_eq!(poller.process_batch().await.unwrap(), 2);
    assert_eq!(poller.process_batch().await.unwrap(), 0);

    assert_eq!(*describing.lines.lock().await, vec![
        format!(
            "Change operation: Insert, Id: {id}, Title: Buy milk, \
             Url: https://example.com/milk, Completed: null"
        ),
        format!(
            "Change operation: Update, Id: {id}, Title: Buy milk, \
             Url: https://example.com/milk, Completed: true"
        ),
    ]);
    assert_eq!(changes.acknowledged().await, vec![ChangeId(1), ChangeId(2)]);
}

#[tokio::test]
async fn rejected_requests_produce_no_changes() {
    let changes = MockChangeSource::new();
    let table = Arc::new(RecordingTable::new(changes.clone()));
    let app = create_router(AppState::new(table, Arc::new(TestClock::new())), Duration::from_secs(30));

    assert_eq!(post(app, json!({ "title": "no url" })).await, StatusCode::BAD_REQUEST);
    assert_eq!(changes.pending_count().await, 0);
}
