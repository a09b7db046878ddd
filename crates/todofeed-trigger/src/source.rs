//! Change source abstraction for the poller.
//!
//! Production code reads the PostgreSQL change log through
//! `todofeed_core::storage::Storage`; tests use the in-memory
//! [`mock::MockChangeSource`].

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use todofeed_core::{
    error::Result,
    models::{ChangeId, ItemChange},
    storage::Storage,
};

/// Operations the poller needs from a change log.
pub trait ChangeSource: Send + Sync + 'static {
    /// Leases up to `batch_size` pending changes for `lease`.
    ///
    /// Returns changes in change-log order. Changes already leased to
    /// someone else are skipped until their lease expires.
    fn claim_batch(
        &self,
        batch_size: usize,
        lease: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemChange>>> + Send + '_>>;

    /// Marks changes as delivered so they are never handed out again.
    ///
    /// Returns the number of changes removed.
    fn acknowledge<'a>(
        &'a self,
        change_ids: &'a [ChangeId],
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;
}

/// Change source reading the `todo_changes` table.
pub struct PostgresChangeSource {
    storage: Arc<Storage>,
}

impl PostgresChangeSource {
    /// Creates a new PostgreSQL change source.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl ChangeSource for PostgresChangeSource {
    fn claim_batch(
        &self,
        batch_size: usize,
        lease: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemChange>>> + Send + '_>> {
        Box::pin(async move { self.storage.todo_changes.claim_batch(batch_size, lease).await })
    }

    fn acknowledge<'a>(
        &'a self,
        change_ids: &'a [ChangeId],
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move { self.storage.todo_changes.acknowledge(change_ids).await })
    }
}

pub mod mock {
    //! In-memory change source for testing.
    //!
    //! Keeps pending and leased changes in separate lists. Claim failures can
    //! be injected to exercise the poller's error handling.

    use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

    use todofeed_core::error::{CoreError, Result};
    use tokio::sync::RwLock;

    use super::{ChangeId, ChangeSource, ItemChange};

    #[derive(Debug, Default)]
    struct State {
        pending: Vec<ItemChange>,
        leased: Vec<ItemChange>,
        acknowledged: Vec<ChangeId>,
        failing_claims: usize,
        claim_calls: usize,
    }

    /// Mock change source backed by vectors.
    #[derive(Debug, Clone, Default)]
    pub struct MockChangeSource {
        state: Arc<RwLock<State>>,
    }

    impl MockChangeSource {
        /// Creates an empty source.
        pub fn new() -> Self {
            Self::default()
        }

        /// Appends a change to the pending log.
        pub async fn push(&self, change: ItemChange) {
            self.state.write().await.pending.push(change);
        }

        /// Makes the next `count` claims fail.
        pub async fn fail_next_claims(&self, count: usize) {
            self.state.write().await.failing_claims = count;
        }

        /// Returns every leased change to the pending log, as if their
        /// leases had expired.
        pub async fn expire_leases(&self) {
            let mut state = self.state.write().await;
            let mut expired = std::mem::take(&mut state.leased);
            expired.append(&mut state.pending);
            expired.sort_by_key(|change| change.change_id);
            state.pending = expired;
        }

        /// Returns acknowledged change ids in acknowledgement order.
        pub async fn acknowledged(&self) -> Vec<ChangeId> {
            self.state.read().await.acknowledged.clone()
        }

        /// Returns the number of changes neither leased nor acknowledged.
        pub async fn pending_count(&self) -> usize {
            self.state.read().await.pending.len()
        }

        /// Returns the number of leased, unacknowledged changes.
        pub async fn leased_count(&self) -> usize {
            self.state.read().await.leased.len()
        }

        /// Returns how many times `claim_batch` was called.
        pub async fn claim_calls(&self) -> usize {
            self.state.read().await.claim_calls
        }
    }

    impl ChangeSource for MockChangeSource {
        fn claim_batch(
            &self,
            batch_size: usize,
            _lease: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemChange>>> + Send + '_>> {
            Box::pin(async move {
                let mut state = self.state.write().await;
                state.claim_calls += 1;

                if state.failing_claims > 0 {
                    state.failing_claims -= 1;
                    return Err(CoreError::Database("injected claim failure".to_string()));
                }

                let take = batch_size.min(state.pending.len());
                let mut batch: Vec<ItemChange> = state.pending.drain(..take).collect();
                for change in &mut batch {
                    change.attempt_count += 1;
                }
                state.leased.extend(batch.iter().cloned());

                Ok(batch)
            })
        }

        fn acknowledge<'a>(
            &'a self,
            change_ids: &'a [ChangeId],
        ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
            Box::pin(async move {
                let mut state = self.state.write().await;
                let before = state.leased.len();
                state.leased.retain(|change| !change_ids.contains(&change.change_id));
                let removed = before - state.leased.len();
                state.acknowledged.extend_from_slice(change_ids);

                Ok(u64::try_from(removed).unwrap_or(u64::MAX))
            })
        }
    }
}
