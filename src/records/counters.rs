//! Seed counter repository.
//!
//! Persistent `(table, column)` counters for the record ingestion flow.
//! Reservation locks the counter row with `SELECT … FOR UPDATE`, so it must
//! run inside an active transaction; the row lock holds until the caller
//! commits or rolls back.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{LskError, LskResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS logical_seed_key_counters (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    last_assigned_value BIGINT NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (table_name, column_name)
)
"#;

const SELECT_FOR_UPDATE_SQL: &str = r#"
SELECT last_assigned_value FROM logical_seed_key_counters
WHERE table_name = $1 AND column_name = $2
FOR UPDATE
"#;

const UPDATE_SQL: &str = r#"
UPDATE logical_seed_key_counters
SET last_assigned_value = $1, last_updated = now()
WHERE table_name = $2 AND column_name = $3
"#;

const INSERT_SQL: &str = r#"
INSERT INTO logical_seed_key_counters (table_name, column_name, last_assigned_value)
VALUES ($1, $2, $3)
"#;

/// Stateless repository over the counter table.
pub struct SeedCounterRepository;

impl SeedCounterRepository {
    /// Create the counter table if absent.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA_SQL).execute(pool).await?;
        Ok(())
    }

    /// Atomically reserve `count` sequential values for `(table, column)`,
    /// returning the first value of the block.
    ///
    /// A missing counter row is created with the block already consumed, so
    /// the first reservation for a fresh key starts at 1.
    pub async fn reserve_block(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        column: &str,
        count: i64,
    ) -> LskResult<i64> {
        if count <= 0 {
            return Err(LskError::InvalidArgument { field: "count" });
        }
        if table.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "table" });
        }
        if column.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "column" });
        }

        let current: Option<i64> = sqlx::query_scalar(SELECT_FOR_UPDATE_SQL)
            .bind(table)
            .bind(column)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| LskError::Persistence {
                reason: format!("locking counter row for {table}:{column}"),
                source: Some(e),
            })?;

        let current_max = current.unwrap_or(0);
        let next_value = current_max + 1;
        let new_max = current_max + count;

        let result = if current.is_some() {
            sqlx::query(UPDATE_SQL)
                .bind(new_max)
                .bind(table)
                .bind(column)
                .execute(&mut **tx)
                .await
        } else {
            sqlx::query(INSERT_SQL)
                .bind(table)
                .bind(column)
                .bind(new_max)
                .execute(&mut **tx)
                .await
        }
        .map_err(|e| LskError::Persistence {
            reason: format!("advancing counter for {table}:{column}"),
            source: Some(e),
        })?;

        if result.rows_affected() != 1 {
            return Err(LskError::Persistence {
                reason: format!(
                    "counter write for {table}:{column} affected {} rows, expected 1",
                    result.rows_affected()
                ),
                source: None,
            });
        }

        tracing::debug!(table, column, next_value, new_max, "reserved seed key block");
        Ok(next_value)
    }
}
