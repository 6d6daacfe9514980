//! Audit log store.
//!
//! One append-only table of resolution events: one row per
//! `(table, column, module)` key per request, carrying the allocated range,
//! the placeholder mapping, and the element fragments before and after
//! resolution. The engine inserts rows and reads `MAX(end_value)`; the
//! read-only queries here exist for operators and tooling. No updates, no
//! deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::error::{LskError, LskResult};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS lsk_resolution_log (
    id BIGSERIAL PRIMARY KEY,
    dev_email TEXT NOT NULL,
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    module_name TEXT NOT NULL,
    start_value BIGINT NOT NULL,
    end_value BIGINT NOT NULL,
    placeholder_mapping JSONB NOT NULL,
    source_xml_elements TEXT NOT NULL,
    resolved_xml_elements TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_lsk_resolution_log_range_key
    ON lsk_resolution_log (table_name, column_name, module_name)
"#;

const INSERT_SQL: &str = r#"
INSERT INTO lsk_resolution_log
    (dev_email, table_name, column_name, module_name,
     start_value, end_value, placeholder_mapping,
     source_xml_elements, resolved_xml_elements)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
"#;

const SELECT_COLUMNS: &str = r#"
SELECT id, dev_email, table_name, column_name, module_name,
       start_value, end_value, placeholder_mapping,
       source_xml_elements, resolved_xml_elements, created_at
FROM lsk_resolution_log
"#;

/// A resolution event to be recorded.
#[derive(Debug, Clone)]
pub struct NewAuditRecord<'a> {
    pub dev_email: &'a str,
    pub table_name: &'a str,
    pub column_name: &'a str,
    pub module_name: &'a str,
    pub start_value: i64,
    pub end_value: i64,
    pub placeholder_mapping: serde_json::Value,
    pub source_xml_elements: String,
    pub resolved_xml_elements: String,
}

/// A committed audit row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: i64,
    pub dev_email: String,
    pub table_name: String,
    pub column_name: String,
    pub module_name: String,
    pub start_value: i64,
    pub end_value: i64,
    pub placeholder_mapping: serde_json::Value,
    pub source_xml_elements: String,
    pub resolved_xml_elements: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for the resolution audit log.
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the audit table and its range-key index if absent.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        for statement in SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Insert one audit row inside the caller's transaction.
    ///
    /// Exactly one row must be affected; anything else is an
    /// [`LskError::AuditWriteFailed`].
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        record: &NewAuditRecord<'_>,
    ) -> LskResult<()> {
        let result = sqlx::query(INSERT_SQL)
            .bind(record.dev_email)
            .bind(record.table_name)
            .bind(record.column_name)
            .bind(record.module_name)
            .bind(record.start_value)
            .bind(record.end_value)
            .bind(&record.placeholder_mapping)
            .bind(&record.source_xml_elements)
            .bind(&record.resolved_xml_elements)
            .execute(&mut **tx)
            .await
            .map_err(|e| LskError::AuditWriteFailed {
                reason: format!(
                    "insert for {}:{}:{}",
                    record.table_name, record.column_name, record.module_name
                ),
                source: Some(e),
            })?;

        if result.rows_affected() != 1 {
            return Err(LskError::AuditWriteFailed {
                reason: format!(
                    "insert for {}:{}:{} affected {} rows, expected 1",
                    record.table_name,
                    record.column_name,
                    record.module_name,
                    result.rows_affected()
                ),
                source: None,
            });
        }
        tracing::debug!(
            table = record.table_name,
            column = record.column_name,
            module = record.module_name,
            start = record.start_value,
            end = record.end_value,
            "audit row inserted"
        );
        Ok(())
    }

    /// Most recent resolutions, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<AuditLogRow>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Full allocation history for one range key, oldest first.
    pub async fn for_range_key(
        &self,
        table: &str,
        column: &str,
        module: &str,
    ) -> Result<Vec<AuditLogRow>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogRow>(&format!(
            "{SELECT_COLUMNS} WHERE table_name = $1 AND column_name = $2 AND module_name = $3 ORDER BY id"
        ))
        .bind(table)
        .bind(column)
        .bind(module)
        .fetch_all(&self.pool)
        .await
    }

    /// Resolutions performed by one developer, newest first.
    pub async fn for_dev_email(
        &self,
        dev_email: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogRow>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogRow>(&format!(
            "{SELECT_COLUMNS} WHERE dev_email = $1 ORDER BY id DESC LIMIT $2"
        ))
        .bind(dev_email)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
