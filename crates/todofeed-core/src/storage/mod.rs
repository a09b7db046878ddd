//! Database access layer for the to-do table and its change log.
//!
//! Repositories translate between domain models and table rows. All SQL in
//! the workspace lives under this module.

use std::sync::Arc;

use sqlx::PgPool;

pub mod schema;
pub mod todo_changes;
pub mod todo_items;

use crate::error::Result;

/// Entry point for all database operations.
///
/// Holds one shared connection pool and a repository per table.
#[derive(Clone)]
pub struct Storage {
    /// Repository for the `todo` table.
    pub todo_items: Arc<todo_items::Repository>,

    /// Repository for the `todo_changes` change log.
    pub todo_changes: Arc<todo_changes::Repository>,

    pool: Arc<PgPool>,
}

impl Storage {
    /// Creates a storage instance sharing `pool` between repositories.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            todo_items: Arc::new(todo_items::Repository::new(pool.clone())),
            todo_changes: Arc::new(todo_changes::Repository::new(pool.clone())),
            pool,
        }
    }

    /// Returns the shared connection pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Creates tables, the change-log trigger, and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if any DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        schema::apply(&self.pool).await
    }

    /// Verifies the database answers a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;

        Ok(())
    }
}
