//! Advisory lock helpers for range allocation.
//!
//! Concurrent allocations for the same `(table, column, module)` key must be
//! strictly serialized across sessions. PostgreSQL's transaction-scoped
//! advisory locks give exactly that: the lock is tied to the transaction and
//! released on commit or rollback, never leaked to the pool.
//!
//! Lock identity is the two-i32 form of `pg_advisory_xact_lock`. Keys are
//! derived with FNV-1a, which is a stable pure function of its input across
//! builds and releases; `DefaultHasher` makes no such promise. A hash
//! collision between two range keys only over-serializes them.

use sqlx::{Postgres, Transaction};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Derive the two lock keys for a `(table, column, module)` range key.
///
/// The first key is partitioned by table under a fixed domain tag so that
/// unrelated advisory-lock users of the same database cannot contend with
/// range allocation.
pub fn range_lock_keys(table: &str, column: &str, module: &str) -> (i32, i32) {
    let key1 = fnv1a(format!("lsk-range:{table}").as_bytes()) as u32 as i32;
    let key2 = fnv1a(format!("{column}\u{1f}{module}").as_bytes()) as u32 as i32;
    (key1, key2)
}

/// Acquire a transaction-scoped advisory lock, blocking until available.
///
/// Released automatically when the enclosing transaction commits or rolls
/// back.
pub async fn advisory_xact_lock(
    tx: &mut Transaction<'_, Postgres>,
    key1: i32,
    key2: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(key1)
        .bind(key2)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Try to acquire a transaction-scoped advisory lock without blocking.
///
/// Returns `false` when another session holds the lock.
pub async fn try_advisory_xact_lock(
    tx: &mut Transaction<'_, Postgres>,
    key1: i32,
    key2: i32,
) -> Result<bool, sqlx::Error> {
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock($1, $2)")
        .bind(key1)
        .bind(key2)
        .fetch_one(&mut **tx)
        .await?;
    Ok(acquired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_deterministic() {
        let a = range_lock_keys("Employee", "EMP_ID", "hr");
        let b = range_lock_keys("Employee", "EMP_ID", "hr");
        assert_eq!(a, b);
    }

    #[test]
    fn lock_keys_partition_by_every_component() {
        let base = range_lock_keys("Employee", "EMP_ID", "hr");
        assert_ne!(base, range_lock_keys("Department", "EMP_ID", "hr"));
        assert_ne!(base, range_lock_keys("Employee", "DEPT_ID", "hr"));
        assert_ne!(base, range_lock_keys("Employee", "EMP_ID", "payroll"));
    }

    #[test]
    fn lock_keys_are_case_sensitive() {
        assert_ne!(
            range_lock_keys("Employee", "EMP_ID", "hr"),
            range_lock_keys("employee", "EMP_ID", "hr"),
        );
    }
}
