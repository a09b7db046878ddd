//! Repository for the `todo_changes` change log.
//!
//! Changes are handed out under a time-limited lease. A consumer that
//! finishes a batch acknowledges it, which deletes the rows; a consumer that
//! dies leaves the lease to expire so the batch is claimed again.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use sqlx::PgPool;

use crate::{
    error::{CoreError, Result},
    models::{ChangeId, ItemChange},
};

/// Repository for change log rows.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Leases up to `batch_size` changes, oldest first.
    ///
    /// Only rows with no lease or an expired lease are eligible. Uses
    /// `FOR UPDATE SKIP LOCKED` so concurrent claimers never block on each
    /// other. The returned batch is sorted by `change_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the lease duration is out of range or the
    /// transaction fails.
    pub async fn claim_batch(&self, batch_size: usize, lease: Duration) -> Result<Vec<ItemChange>> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| CoreError::InvalidInput(format!("lease duration out of range: {e}")))?;
        let limit = i64::try_from(batch_size).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;

        let change_ids: Vec<ChangeId> = sqlx::query_scalar(
            r"
            SELECT change_id FROM todo_changes
            WHERE leased_until IS NULL OR leased_until <= $1
            ORDER BY change_id ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        if change_ids.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = change_ids.iter().map(|id| id.0).collect();
        let mut changes = sqlx::query_as::<_, ItemChange>(
            r"
            UPDATE todo_changes
            SET leased_until = $2, attempt_count = attempt_count + 1
            WHERE change_id = ANY($1)
            RETURNING change_id, operation, item_id, item_order, title, url, completed,
                      changed_at, attempt_count
            ",
        )
        .bind(&ids)
        .bind(now + lease)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        changes.sort_by_key(|change| change.change_id);
        Ok(changes)
    }

    /// Removes delivered changes. Returns how many rows were deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn acknowledge(&self, change_ids: &[ChangeId]) -> Result<u64> {
        if change_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = change_ids.iter().map(|id| id.0).collect();
        let result = sqlx::query("DELETE FROM todo_changes WHERE change_id = ANY($1)")
            .bind(&ids)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts changes not yet acknowledged, leased or not.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn backlog(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM todo_changes").fetch_one(&*self.pool).await?;

        Ok(count.0)
    }
}
