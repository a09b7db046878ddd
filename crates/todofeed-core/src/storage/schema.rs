//! Idempotent schema setup.
//!
//! The `todo` table is the durable sink. Every row change on it is copied by
//! an `AFTER` trigger into `todo_changes`, which the change-feed poller
//! consumes. Deletes record the row as it was before removal.

use sqlx::PgPool;
use tracing::debug;

use crate::error::Result;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "todo table",
        r"
        CREATE TABLE IF NOT EXISTS todo (
            id UUID PRIMARY KEY,
            item_order INTEGER,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            completed BOOLEAN
        )
        ",
    ),
    (
        "todo_changes table",
        r"
        CREATE TABLE IF NOT EXISTS todo_changes (
            change_id BIGSERIAL PRIMARY KEY,
            operation TEXT NOT NULL CHECK (operation IN ('INSERT', 'UPDATE', 'DELETE')),
            item_id UUID NOT NULL,
            item_order INTEGER,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            completed BOOLEAN,
            changed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            leased_until TIMESTAMPTZ,
            attempt_count INTEGER NOT NULL DEFAULT 0
        )
        ",
    ),
    (
        "change capture function",
        r"
        CREATE OR REPLACE FUNCTION record_todo_change() RETURNS TRIGGER AS $$
        BEGIN
            IF TG_OP = 'DELETE' THEN
                INSERT INTO todo_changes (operation, item_id, item_order, title, url, completed)
                VALUES ('DELETE', OLD.id, OLD.item_order, OLD.title, OLD.url, OLD.completed);
                RETURN OLD;
            END IF;

            INSERT INTO todo_changes (operation, item_id, item_order, title, url, completed)
            VALUES (TG_OP, NEW.id, NEW.item_order, NEW.title, NEW.url, NEW.completed);
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        ",
    ),
    ("previous change trigger", "DROP TRIGGER IF EXISTS todo_change_feed ON todo"),
    (
        "change trigger",
        r"
        CREATE TRIGGER todo_change_feed
        AFTER INSERT OR UPDATE OR DELETE ON todo
        FOR EACH ROW EXECUTE FUNCTION record_todo_change()
        ",
    ),
    (
        "todo_changes lease index",
        r"
        CREATE INDEX IF NOT EXISTS idx_todo_changes_lease
        ON todo_changes (leased_until, change_id)
        ",
    ),
];

/// Applies every schema statement in order.
///
/// # Errors
///
/// Returns `CoreError::Database` if a statement fails.
pub async fn apply(pool: &PgPool) -> Result<()> {
    for &(step, sql) in STATEMENTS {
        debug!(step, "applying schema step");
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_recreated_after_function() {
        let position = |name: &str| STATEMENTS.iter().position(|(step, _)| *step == name).unwrap();

        assert!(position("change capture function") < position("previous change trigger"));
        assert!(position("previous change trigger") < position("change trigger"));
        assert!(position("todo table") < position("change trigger"));
    }

    #[test]
    fn change_log_accepts_only_known_operations() {
        let (_, ddl) = STATEMENTS[1];
        for op in ["'INSERT'", "'UPDATE'", "'DELETE'"] {
            assert!(ddl.contains(op));
        }
    }
}
