//! Repository for the `todo` table.
//!
//! Writes are full-record upserts keyed by id, matching the behaviour of a
//! SQL output binding: a new id inserts, a known id overwrites every column.

use std::sync::Arc;

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    error::Result,
    models::{ToDoId, ToDoItem},
};

/// Repository for to-do rows.
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

    /// Inserts the item, or replaces every column of the existing row.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn upsert(&self, item: &ToDoItem) -> Result<()> {
        Self::upsert_impl(&*self.pool, item).await
    }

    async fn upsert_impl<'e, E>(executor: E, item: &ToDoItem) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r"
            INSERT INTO todo (id, item_order, title, url, completed)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET item_order = EXCLUDED.item_order,
                title = EXCLUDED.title,
                url = EXCLUDED.url,
                completed = EXCLUDED.completed
            ",
        )
        .bind(item.id)
        .bind(item.order)
        .bind(&item.title)
        .bind(&item.url)
        .bind(item.completed)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Finds an item by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, id: ToDoId) -> Result<Option<ToDoItem>> {
        let item = sqlx::query_as::<_, ToDoItem>(
            r"
            SELECT id, item_order, title, url, completed
            FROM todo
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(item)
    }

    /// Deletes an item. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn delete(&self, id: ToDoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todo WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts all items.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM todo").fetch_one(&*self.pool).await?;

        Ok(count.0)
    }
}
