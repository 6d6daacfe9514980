//! Generic record ingestion.
//!
//! A persistence flow independent of the resolution engine: an XML document
//! is parsed into flat records (tag = table, attributes = columns), every
//! placeholder receives a value from a persistent `(table, column)` counter,
//! foreign-key links resolve against the keys generated in the same batch,
//! and the records are inserted into their tables in one transaction.
//!
//! It shares the placeholder grammar and the database with the resolution
//! engine, nothing else; the `module` namespace does not apply here.

pub mod counters;
pub mod dao;
pub mod parser;
pub mod service;
pub mod types;

pub use counters::SeedCounterRepository;
pub use dao::RecordDao;
pub use parser::parse_records;
pub use service::{IngestSummary, RecordIngestService};
pub use types::{ParsedRecord, ParsedRecordBuilder, PrimaryKey, ResolvedRecord};
