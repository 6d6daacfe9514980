//! Placeholder scanner.
//!
//! A single textual pass over an XML payload, producing two
//! insertion-ordered structures: the distinct primary-key placeholders with
//! the element fragments that contain them, and the distinct `REF:{…}`
//! references with the placeholder each one targets.
//!
//! The scanner is deliberately not an XML parser. It matches fixed attribute
//! shapes inside tag text and leaves everything else alone; a placeholder
//! only counts when it is the entire quoted value of an attribute.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LskError, LskResult};

/// An opening or self-closing tag. Quoted sections may contain `<` and `>`.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<[A-Za-z_][A-Za-z0-9_]*(?:[^<>"]|"[^"]*")*>"#).unwrap());

/// An `attr="value"` pair inside a tag. Tag and attribute names match
/// case-insensitively; the value is captured verbatim.
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"([^"]*)""#).unwrap());

/// Strict placeholder grammar: `Table:Column:LogicalId`.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([A-Za-z0-9_]+):([A-Za-z0-9_]+):([^"\s:]+)$"#).unwrap());

/// Relaxed placeholder shape used to distinguish "structurally a placeholder
/// with an empty segment" (an error) from "not a placeholder at all".
static PLACEHOLDER_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([A-Za-z0-9_]*):([A-Za-z0-9_]*):([^"\s:]*)$"#).unwrap());

/// Outer reference shape. Nested braces and missing close-braces never match.
static REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^REF:\{([^{}]*)\}$"#).unwrap());

/// A distinct PK placeholder together with every element fragment it
/// appeared in, in document order.
#[derive(Debug, Clone)]
pub struct PkEntry {
    pub placeholder: String,
    pub fragments: Vec<String>,
}

/// Distinct PK placeholders in order of first appearance.
///
/// Iteration order is part of the contract: the resolution engine assigns
/// values in this order, so the first placeholder encountered receives the
/// smallest value of its range.
#[derive(Debug, Default)]
pub struct PkScan {
    entries: Vec<PkEntry>,
    index: HashMap<String, usize>,
}

impl PkScan {
    fn record(&mut self, placeholder: &str, fragment: &str) {
        match self.index.get(placeholder) {
            Some(&i) => self.entries[i].fragments.push(fragment.to_string()),
            None => {
                self.index.insert(placeholder.to_string(), self.entries.len());
                self.entries.push(PkEntry {
                    placeholder: placeholder.to_string(),
                    fragments: vec![fragment.to_string()],
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct placeholders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, placeholder: &str) -> bool {
        self.index.contains_key(placeholder)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PkEntry> {
        self.entries.iter()
    }
}

/// A distinct `REF:{…}` string and the placeholder it targets.
#[derive(Debug, Clone)]
pub struct FkEntry {
    /// The full reference string, braces included.
    pub reference: String,
    /// The placeholder between the braces.
    pub target: String,
}

/// Distinct references in order of first appearance. Repeats are dropped.
#[derive(Debug, Default)]
pub struct FkScan {
    entries: Vec<FkEntry>,
    seen: HashSet<String>,
}

impl FkScan {
    fn record(&mut self, reference: &str, target: &str) {
        if self.seen.insert(reference.to_string()) {
            self.entries.push(FkEntry {
                reference: reference.to_string(),
                target: target.to_string(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FkEntry> {
        self.entries.iter()
    }
}

/// Classification of one attribute value against the placeholder grammar.
enum ValueShape<'a> {
    Placeholder(&'a str),
    EmptySegment(&'a str),
    Other,
}

fn classify(value: &str) -> ValueShape<'_> {
    if PLACEHOLDER_RE.is_match(value) {
        ValueShape::Placeholder(value)
    } else if PLACEHOLDER_SHAPE_RE.is_match(value) {
        ValueShape::EmptySegment(value)
    } else {
        ValueShape::Other
    }
}

/// Split a valid placeholder into `(table, column, logical_id)`.
///
/// Returns `None` when the value does not satisfy the grammar.
pub(crate) fn parse_placeholder(value: &str) -> Option<(&str, &str, &str)> {
    let caps = PLACEHOLDER_RE.captures(value)?;
    Some((
        caps.get(1).unwrap().as_str(),
        caps.get(2).unwrap().as_str(),
        caps.get(3).unwrap().as_str(),
    ))
}

/// Whether a value satisfies the placeholder grammar.
pub(crate) fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_RE.is_match(value)
}

fn empty_segment_error(value: &str) -> LskError {
    let shape = PLACEHOLDER_SHAPE_RE.captures(value).expect("shape pre-checked");
    let reason = if shape.get(1).unwrap().as_str().is_empty() {
        "empty table segment"
    } else if shape.get(2).unwrap().as_str().is_empty() {
        "empty column segment"
    } else {
        "empty logical id"
    };
    LskError::InvalidPlaceholder {
        placeholder: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Find every distinct PK placeholder and the element fragments carrying it.
///
/// A placeholder-shaped attribute value with an empty segment is an
/// [`LskError::InvalidPlaceholder`]; values that merely resemble a
/// placeholder (extra colons, illegal segment characters) are ignored.
pub fn scan_pk_placeholders(text: &str) -> LskResult<PkScan> {
    let mut scan = PkScan::default();
    for tag in TAG_RE.find_iter(text) {
        let fragment = tag.as_str();
        for attr in ATTR_RE.captures_iter(fragment) {
            let value = attr.get(2).unwrap().as_str();
            match classify(value) {
                ValueShape::Placeholder(p) => scan.record(p, fragment),
                ValueShape::EmptySegment(v) => return Err(empty_segment_error(v)),
                ValueShape::Other => {}
            }
        }
    }
    tracing::debug!(distinct = scan.len(), "scanned PK placeholders");
    Ok(scan)
}

/// Find every distinct `REF:{…}` reference, first occurrence only.
///
/// The body between the braces must itself satisfy the placeholder grammar;
/// a body with an empty segment is an [`LskError::InvalidPlaceholder`].
pub fn scan_fk_references(text: &str) -> LskResult<FkScan> {
    let mut scan = FkScan::default();
    for tag in TAG_RE.find_iter(text) {
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            let value = attr.get(2).unwrap().as_str();
            let Some(caps) = REF_RE.captures(value) else {
                continue;
            };
            let body = caps.get(1).unwrap().as_str();
            match classify(body) {
                ValueShape::Placeholder(p) => scan.record(value, p),
                ValueShape::EmptySegment(v) => return Err(empty_segment_error(v)),
                ValueShape::Other => {}
            }
        }
    }
    tracing::debug!(distinct = scan.len(), "scanned FK references");
    Ok(scan)
}
