//! LSK resolution engine.
//!
//! Transforms XML documents authored with symbolic placeholder identifiers
//! into documents carrying concrete, globally-monotonic integer identifiers
//! ("logical seed keys") drawn from PostgreSQL, with a complete audit trail
//! of every range allocation.
//!
//! ## Flow
//!
//! ```text
//! input XML → scanner → resolver ──(advisory lock + MAX read)── allocator
//!                          │
//!                          ├── substitution → resolved XML
//!                          └── audit rows (same transaction)
//! ```
//!
//! An author writes attribute values like `Employee:EMP_ID:alice` and
//! references like `REF:{Employee:EMP_ID:alice}`. [`LskResolver::resolve`]
//! assigns each distinct placeholder the next value of its
//! `(table, column, module)` counter, rewrites every occurrence, and records
//! one audit row per touched counter with the allocated range, the
//! placeholder mapping, and the affected element fragments.
//!
//! Concurrent requests against the same counter are serialized by a
//! transaction-scoped advisory lock held from the counter read to the audit
//! commit, so committed ranges never overlap.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use lsk_engine::{DatabaseConfig, LskResolver};
//!
//! let pool = DatabaseConfig::default().connect().await?;
//! let resolver = LskResolver::new(pool);
//! let resolved = resolver
//!     .resolve("hr", r#"<Employee emp_id="Employee:EMP_ID:alice"/>"#, "dev@example.com")
//!     .await?;
//! assert_eq!(resolved, r#"<Employee emp_id="Employee:EMP_ID:hr:1"/>"#);
//! ```
//!
//! The [`records`] module carries a second, independent flow that persists
//! whole XML documents as table rows, generating keys from a counter table.

pub mod database;
pub mod error;
pub mod records;
pub mod resolution;
pub mod scanner;

pub use database::{AuditLogRepository, AuditLogRow, DatabaseConfig, NewAuditRecord};
pub use error::{LskError, LskResult};
pub use records::{IngestSummary, ParsedRecord, RecordIngestService};
pub use resolution::{LskResolver, RangeKey};
pub use scanner::{scan_fk_references, scan_pk_placeholders, FkScan, PkScan};
