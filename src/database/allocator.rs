//! Range allocator.
//!
//! One operation: given a `(table, column, module)` key, return the next
//! unused starting value while holding that key's advisory lock for the rest
//! of the enclosing transaction.
//!
//! The allocator writes nothing. Reservation is implicit: the caller, still
//! inside the same transaction and therefore still holding the lock, inserts
//! the audit row for the chosen range before committing. A contending
//! allocator for the same key blocks on the lock and can never observe a
//! stale maximum.

use sqlx::{Postgres, Transaction};

use super::locks::{advisory_xact_lock, range_lock_keys};

const SELECT_MAX_SQL: &str = r#"
SELECT MAX(end_value)
FROM lsk_resolution_log
WHERE table_name = $1 AND column_name = $2 AND module_name = $3
"#;

/// Next starting value for the key, serialized against concurrent callers.
///
/// Blocks until the key's advisory lock is available. Database errors
/// propagate unchanged; the caller rolls back.
pub async fn next_starting_value(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
    module: &str,
) -> Result<i64, sqlx::Error> {
    let (key1, key2) = range_lock_keys(table, column, module);
    tracing::debug!(key1, key2, table, column, module, "acquiring range lock");
    advisory_xact_lock(tx, key1, key2).await?;

    let max: Option<i64> = sqlx::query_scalar(SELECT_MAX_SQL)
        .bind(table)
        .bind(column)
        .bind(module)
        .fetch_one(&mut **tx)
        .await?;

    let next = max.unwrap_or(0) + 1;
    tracing::debug!(table, column, module, next, "computed next starting value");
    Ok(next)
}
