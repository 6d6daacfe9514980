//! Record types for the generic ingestion flow.
//!
//! A [`ParsedRecord`] is an immutable description of one XML element: the
//! tag acts as the table name, attributes as column data, and placeholder
//! attributes as key material. Records are assembled through
//! [`ParsedRecordBuilder`], which owns the transient maps and freezes into
//! the read-only value. Key resolution produces a separate
//! [`ResolvedRecord`] rather than mutating the parsed value.

use std::collections::BTreeMap;

/// The primary-key attribute of a record and the placeholder it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub attribute: String,
    pub placeholder: String,
}

/// One parsed XML element, frozen.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    table_name: String,
    primary_key: Option<PrimaryKey>,
    attributes: BTreeMap<String, String>,
    foreign_keys: BTreeMap<String, String>,
}

impl ParsedRecord {
    /// The XML tag name, used as the table name by convention.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.primary_key.as_ref()
    }

    pub fn pk_placeholder(&self) -> Option<&str> {
        self.primary_key.as_ref().map(|pk| pk.placeholder.as_str())
    }

    /// Regular attributes, sorted by name.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Foreign-key attribute name → parent placeholder, sorted by name.
    pub fn foreign_keys(&self) -> &BTreeMap<String, String> {
        &self.foreign_keys
    }
}

/// Builder for [`ParsedRecord`]. Used by the parser only.
#[derive(Debug)]
pub struct ParsedRecordBuilder {
    table_name: String,
    primary_key: Option<PrimaryKey>,
    attributes: BTreeMap<String, String>,
    foreign_keys: BTreeMap<String, String>,
}

impl ParsedRecordBuilder {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            primary_key: None,
            attributes: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
        }
    }

    /// Record the primary-key attribute. The last one found wins.
    pub fn set_primary_key(&mut self, attribute: &str, placeholder: &str) {
        if let Some(existing) = &self.primary_key {
            tracing::warn!(
                table = %self.table_name,
                previous = %existing.attribute,
                replacement = %attribute,
                "multiple placeholder attributes on one element, keeping the last"
            );
        }
        self.primary_key = Some(PrimaryKey {
            attribute: attribute.to_string(),
            placeholder: placeholder.to_string(),
        });
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    pub fn add_foreign_key(&mut self, attribute: &str, parent_placeholder: &str) {
        self.foreign_keys
            .insert(attribute.to_string(), parent_placeholder.to_string());
    }

    pub fn has_foreign_key(&self, attribute: &str) -> bool {
        self.foreign_keys.contains_key(attribute)
    }

    /// Freeze into the immutable record.
    pub fn freeze(self) -> ParsedRecord {
        ParsedRecord {
            table_name: self.table_name,
            primary_key: self.primary_key,
            attributes: self.attributes,
            foreign_keys: self.foreign_keys,
        }
    }
}

/// A record whose key material has been resolved to concrete values.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    record: ParsedRecord,
    generated_pk: Option<i64>,
    resolved_foreign_keys: BTreeMap<String, i64>,
}

impl ResolvedRecord {
    pub fn new(
        record: ParsedRecord,
        generated_pk: Option<i64>,
        resolved_foreign_keys: BTreeMap<String, i64>,
    ) -> Self {
        Self {
            record,
            generated_pk,
            resolved_foreign_keys,
        }
    }

    pub fn record(&self) -> &ParsedRecord {
        &self.record
    }

    pub fn generated_pk(&self) -> Option<i64> {
        self.generated_pk
    }

    /// Foreign-key attribute name → resolved parent key, sorted by name.
    pub fn resolved_foreign_keys(&self) -> &BTreeMap<String, i64> {
        &self.resolved_foreign_keys
    }
}
