//! Per-request accumulators for the resolution engine.

use std::collections::BTreeMap;

/// The triple under which values are allocated and audited.
///
/// `module` comes from the caller, not from the placeholder text. Equality
/// and hashing use all three components, byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeKey {
    pub table: String,
    pub column: String,
    pub module: String,
}

impl RangeKey {
    pub fn new(table: &str, column: &str, module: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            module: module.to_string(),
        }
    }
}

impl std::fmt::Display for RangeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.column, self.module)
    }
}

/// Accumulator for one [`RangeKey`] within a single request.
///
/// Values assigned to the same key form one contiguous run
/// `[first_value, last_value]`; `fragments` collects the element text of
/// every tag that carried a placeholder of this key, in scanner order.
#[derive(Debug)]
pub struct RangeInfo {
    pub first_value: i64,
    pub last_value: i64,
    pub fragments: Vec<String>,
    /// Placeholder → resolved string, for this key only.
    pub mapping: BTreeMap<String, String>,
}

impl RangeInfo {
    pub fn new(initial_value: i64) -> Self {
        Self {
            first_value: initial_value,
            last_value: initial_value,
            fragments: Vec::new(),
            mapping: BTreeMap::new(),
        }
    }
}

/// Ranges touched by a request, in order of first contact.
#[derive(Debug, Default)]
pub struct RangeTable {
    entries: Vec<(RangeKey, RangeInfo)>,
}

impl RangeTable {
    /// Fetch the accumulator for `key`, creating it with `initial_value` on
    /// first contact.
    pub fn entry(&mut self, key: &RangeKey, initial_value: i64) -> &mut RangeInfo {
        if let Some(i) = self.entries.iter().position(|(k, _)| k == key) {
            return &mut self.entries[i].1;
        }
        self.entries.push((key.clone(), RangeInfo::new(initial_value)));
        &mut self.entries.last_mut().unwrap().1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(RangeKey, RangeInfo)> {
        self.entries.iter()
    }
}
