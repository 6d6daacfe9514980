//! Dynamic single-table insert for resolved records.
//!
//! Table and column names come from XML, so they are spliced into SQL only
//! after passing a strict identifier check. Values bind positionally:
//! generated keys as BIGINT, regular attributes as TEXT.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::{Postgres, Transaction};

use crate::error::{LskError, LskResult};

use super::types::ResolvedRecord;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

fn check_identifier(name: &str, what: &str) -> LskResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(LskError::Persistence {
            reason: format!("invalid {what} name for SQL: '{name}'"),
            source: None,
        })
    }
}

/// Column layout shared by every record of one batch, derived from the
/// first record: generated key first, then attributes, then foreign keys,
/// each group sorted by name.
struct ColumnLayout {
    pk_column: Option<String>,
    attribute_columns: Vec<String>,
    fk_columns: Vec<String>,
}

impl ColumnLayout {
    fn of(record: &ResolvedRecord) -> Self {
        Self {
            pk_column: record.record().primary_key().map(|pk| pk.attribute.clone()),
            attribute_columns: record.record().attributes().keys().cloned().collect(),
            fk_columns: record.resolved_foreign_keys().keys().cloned().collect(),
        }
    }

    fn matches(&self, record: &ResolvedRecord) -> bool {
        self.pk_column.as_deref() == record.record().primary_key().map(|pk| pk.attribute.as_str())
            && self
                .attribute_columns
                .iter()
                .eq(record.record().attributes().keys())
            && self.fk_columns.iter().eq(record.resolved_foreign_keys().keys())
    }

    fn column_names(&self) -> Vec<&str> {
        self.pk_column
            .iter()
            .chain(&self.attribute_columns)
            .chain(&self.fk_columns)
            .map(String::as_str)
            .collect()
    }
}

fn build_insert_sql(table: &str, columns: &[&str]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let params: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({})",
        quoted.join(", "),
        params.join(", ")
    )
}

/// Stateless DAO for batch insertion.
pub struct RecordDao;

impl RecordDao {
    /// Insert every record into `table_name` inside the caller's
    /// transaction. All records must share the structure of the first one.
    /// Returns the number of rows inserted.
    pub async fn batch_insert(
        tx: &mut Transaction<'_, Postgres>,
        table_name: &str,
        records: &[ResolvedRecord],
    ) -> LskResult<u64> {
        let Some(first) = records.first() else {
            return Ok(0);
        };

        check_identifier(table_name, "table")?;
        let layout = ColumnLayout::of(first);
        let columns = layout.column_names();
        if columns.is_empty() {
            tracing::warn!(table = table_name, "records carry no columns, nothing to insert");
            return Ok(0);
        }
        for column in &columns {
            check_identifier(column, "column")?;
        }

        let sql = build_insert_sql(table_name, &columns);
        tracing::debug!(table = table_name, rows = records.len(), %sql, "batch insert");

        let mut inserted = 0u64;
        for record in records {
            if !layout.matches(record) {
                return Err(LskError::Persistence {
                    reason: format!("inconsistent record shape for table '{table_name}'"),
                    source: None,
                });
            }

            let mut query = sqlx::query(&sql);
            if layout.pk_column.is_some() {
                let Some(pk_value) = record.generated_pk() else {
                    return Err(LskError::Persistence {
                        reason: format!(
                            "record for table '{table_name}' has no generated key value"
                        ),
                        source: None,
                    });
                };
                query = query.bind(pk_value);
            }
            for column in &layout.attribute_columns {
                query = query.bind(&record.record().attributes()[column]);
            }
            for column in &layout.fk_columns {
                query = query.bind(record.resolved_foreign_keys()[column]);
            }

            let result = query.execute(&mut **tx).await.map_err(|e| LskError::Persistence {
                reason: format!("insert into '{table_name}'"),
                source: Some(e),
            })?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }
}
