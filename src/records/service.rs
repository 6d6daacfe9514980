//! Record ingestion service.
//!
//! Orchestrates the generic persistence flow in a single transaction:
//! parse the document into records, reserve a counter value for every
//! distinct placeholder, resolve foreign-key links against the keys
//! generated in this batch, then insert the records grouped by table.
//! Any failure rolls the whole batch back.

use std::collections::BTreeMap;
use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::{LskError, LskResult};
use crate::scanner;

use super::counters::SeedCounterRepository;
use super::dao::RecordDao;
use super::parser;
use super::types::ResolvedRecord;

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub records_parsed: usize,
    pub keys_generated: usize,
    pub rows_inserted: u64,
}

/// The ingestion flow. Stateless apart from the pool.
pub struct RecordIngestService {
    pool: PgPool,
}

impl RecordIngestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse `xml` and persist every record it describes.
    pub async fn ingest(&self, xml: &str) -> LskResult<IngestSummary> {
        if xml.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "input_xml" });
        }

        let records = parser::parse_records(xml)?;
        if records.is_empty() {
            tracing::info!("no records parsed, nothing to persist");
            return Ok(IngestSummary {
                records_parsed: 0,
                keys_generated: 0,
                rows_inserted: 0,
            });
        }

        let mut tx = self.pool.begin().await.map_err(|e| LskError::Persistence {
            reason: "transaction begin".to_string(),
            source: Some(e),
        })?;

        // Stage 1: one generated key per distinct placeholder. The counter
        // key comes from the placeholder text, not the element tag.
        let mut generated: HashMap<String, i64> = HashMap::new();
        for record in &records {
            let Some(placeholder) = record.pk_placeholder() else {
                continue;
            };
            if generated.contains_key(placeholder) {
                tracing::warn!(placeholder, "duplicate placeholder, reusing generated key");
                continue;
            }
            let Some((table, column, _)) = scanner::parse_placeholder(placeholder) else {
                return Err(LskError::InvalidPlaceholder {
                    placeholder: placeholder.to_string(),
                    reason: "expected Table:Column:LogicalId".to_string(),
                });
            };
            let value = SeedCounterRepository::reserve_block(&mut tx, table, column, 1).await?;
            generated.insert(placeholder.to_string(), value);
        }

        // Stage 2: resolve links against this batch.
        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            let pk_value = record.pk_placeholder().map(|p| generated[p]);
            let mut fk_values = BTreeMap::new();
            for (attribute, target) in record.foreign_keys() {
                let Some(&value) = generated.get(target) else {
                    return Err(LskError::UnresolvedReference {
                        reference: attribute.clone(),
                        target: target.clone(),
                    });
                };
                fk_values.insert(attribute.clone(), value);
            }
            resolved.push(ResolvedRecord::new(record, pk_value, fk_values));
        }

        // Stage 3: insert, grouped by table in first-appearance order.
        let mut groups: Vec<(String, Vec<ResolvedRecord>)> = Vec::new();
        for record in resolved {
            let table = record.record().table_name().to_string();
            match groups.iter_mut().find(|(t, _)| *t == table) {
                Some((_, group)) => group.push(record),
                None => groups.push((table, vec![record])),
            }
        }

        let mut rows_inserted = 0u64;
        let mut records_parsed = 0usize;
        for (table, group) in &groups {
            records_parsed += group.len();
            rows_inserted += RecordDao::batch_insert(&mut tx, table, group).await?;
        }

        tx.commit().await.map_err(|e| LskError::Persistence {
            reason: "transaction commit".to_string(),
            source: Some(e),
        })?;

        let summary = IngestSummary {
            records_parsed,
            keys_generated: generated.len(),
            rows_inserted,
        };
        tracing::info!(
            records = summary.records_parsed,
            keys = summary.keys_generated,
            rows = summary.rows_inserted,
            "record ingestion committed"
        );
        Ok(summary)
    }
}
