//! Resolution coordinator.
//!
//! Drives a whole resolution request: scan the document, allocate values
//! under the per-key advisory lock, resolve references, substitute, and
//! record the audit trail. Allocation and audit share one transaction on one
//! connection, so the advisory lock for each touched key is held from the
//! `MAX(end_value)` read until the audit row is committed; a concurrent
//! request for the same key can never read a stale maximum.
//!
//! Request lifecycle: `Idle → Scanning → Allocating → Resolving →
//! Substituting → Auditing → Done`, with any error rolling the open
//! transaction back (an early drop of the transaction has the same effect,
//! which is what makes cancellation safe).

use std::collections::HashMap;

use sqlx::PgPool;

use crate::database::allocator;
use crate::database::audit_log::{AuditLogRepository, NewAuditRecord};
use crate::error::{LskError, LskResult};
use crate::scanner;

pub mod types;

pub use types::{RangeInfo, RangeKey, RangeTable};

/// The resolution engine. Stateless apart from the pool.
pub struct LskResolver {
    pool: PgPool,
}

impl LskResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolve every placeholder and reference in `input_xml`, assigning
    /// fresh values from the per-`(table, column, module)` counters and
    /// recording one audit row per touched range key.
    ///
    /// A document with no placeholders and no references is returned
    /// unchanged without touching the database.
    pub async fn resolve(
        &self,
        module_name: &str,
        input_xml: &str,
        dev_email: &str,
    ) -> LskResult<String> {
        if module_name.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "module_name" });
        }
        if input_xml.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "input_xml" });
        }
        if dev_email.trim().is_empty() {
            return Err(LskError::InvalidArgument { field: "dev_email" });
        }

        tracing::info!(dev_email, module = module_name, "starting LSK resolution");

        // Phase A: scan.
        let pk_scan = scanner::scan_pk_placeholders(input_xml)?;
        let fk_scan = scanner::scan_fk_references(input_xml)?;
        if pk_scan.is_empty() && fk_scan.is_empty() {
            tracing::info!("no placeholders or references found, returning input unchanged");
            return Ok(input_xml.to_string());
        }
        tracing::info!(
            pk_placeholders = pk_scan.len(),
            fk_references = fk_scan.len(),
            "scan complete"
        );

        // Phase B: allocate, inside the transaction that will also audit.
        let mut pk_map: HashMap<String, String> = HashMap::new();
        let mut ranges = RangeTable::default();
        let mut tx = None;

        if !pk_scan.is_empty() {
            let mut t = self.pool.begin().await.map_err(|e| LskError::AllocationFailed {
                context: "transaction begin".to_string(),
                source: e,
            })?;
            let mut next_value: HashMap<RangeKey, i64> = HashMap::new();

            for entry in pk_scan.iter() {
                let (table, column) = parse_table_column(&entry.placeholder)?;
                let key = RangeKey::new(table, column, module_name);

                let assigned = match next_value.get(&key) {
                    Some(v) => *v,
                    None => allocator::next_starting_value(&mut t, table, column, module_name)
                        .await
                        .map_err(|e| LskError::AllocationFailed {
                            context: key.to_string(),
                            source: e,
                        })?,
                };
                next_value.insert(key.clone(), assigned + 1);

                let resolved = format!("{table}:{column}:{module_name}:{assigned}");
                let info = ranges.entry(&key, assigned);
                info.last_value = assigned;
                info.fragments.extend(entry.fragments.iter().cloned());
                info.mapping.insert(entry.placeholder.clone(), resolved.clone());

                tracing::debug!(
                    placeholder = %entry.placeholder,
                    %resolved,
                    "assigned seed key"
                );
                pk_map.insert(entry.placeholder.clone(), resolved);
            }
            tx = Some(t);
        }

        // Phase C: resolve references against the placeholders of this
        // document. Reference strings and placeholders cannot collide as map
        // keys (one carries braces, the other cannot).
        let mut final_map = pk_map;
        for fk in fk_scan.iter() {
            let Some(resolved) = final_map.get(&fk.target).cloned() else {
                return Err(LskError::UnresolvedReference {
                    reference: fk.reference.clone(),
                    target: fk.target.clone(),
                });
            };
            final_map.insert(fk.reference.clone(), resolved);
        }

        // Phase D: substitute over the whole document.
        let resolved_xml = replace_quoted(input_xml, &final_map);

        // Phase E: one audit row per range key, then commit.
        if let Some(mut t) = tx {
            for (key, info) in ranges.iter() {
                let mapping_json = serde_json::to_value(&info.mapping).map_err(|e| {
                    LskError::AuditWriteFailed {
                        reason: format!("mapping serialization: {e}"),
                        source: None,
                    }
                })?;
                let source_text = info.fragments.join("\n");
                let resolved_text = info
                    .fragments
                    .iter()
                    .map(|f| replace_quoted(f, &final_map))
                    .collect::<Vec<_>>()
                    .join("\n");

                let record = NewAuditRecord {
                    dev_email,
                    table_name: &key.table,
                    column_name: &key.column,
                    module_name: &key.module,
                    start_value: info.first_value,
                    end_value: info.last_value,
                    placeholder_mapping: mapping_json,
                    source_xml_elements: source_text,
                    resolved_xml_elements: resolved_text,
                };
                AuditLogRepository::insert(&mut t, &record).await?;
                tracing::info!(
                    range_key = %key,
                    start = info.first_value,
                    end = info.last_value,
                    "audited range"
                );
            }
            t.commit().await.map_err(|e| LskError::AuditWriteFailed {
                reason: "transaction commit".to_string(),
                source: Some(e),
            })?;
        }

        tracing::info!(dev_email, "LSK resolution finished");
        Ok(resolved_xml)
    }
}

/// Table and column segments of a placeholder.
fn parse_table_column(placeholder: &str) -> LskResult<(&str, &str)> {
    let mut parts = placeholder.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(table), Some(column), Some(_)) if !table.is_empty() && !column.is_empty() => {
            Ok((table, column))
        }
        _ => Err(LskError::InvalidPlaceholder {
            placeholder: placeholder.to_string(),
            reason: "expected Table:Column:LogicalId".to_string(),
        }),
    }
}

/// Replace every quoted occurrence of each map key with its quoted value.
///
/// Keys are replaced only when wrapped in ASCII double quotes, i.e. when
/// they are an entire attribute value. Entries are pairwise non-overlapping,
/// so iteration order does not matter.
pub fn replace_quoted(text: &str, replacements: &HashMap<String, String>) -> String {
    let mut current = text.to_string();
    for (from, to) in replacements {
        let quoted_from = format!("\"{from}\"");
        let quoted_to = format!("\"{to}\"");
        current = current.replace(&quoted_from, &quoted_to);
    }
    current
}
