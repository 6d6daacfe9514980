//! XML record parser.
//!
//! Event-driven parse of an XML document into a flat list of
//! [`ParsedRecord`]s, in document order. The root element is a container and
//! produces no record.
//!
//! Attribute classification, per element:
//! - a value satisfying the placeholder grammar is the record's primary-key
//!   placeholder (the last one found wins, with a warning);
//! - a value of the form `REF:{…}` is an explicit foreign-key link;
//! - anything else is a regular attribute. Empty values are skipped.
//!
//! Nesting implies linkage: a child of an element that has a primary-key
//! placeholder receives an implicit foreign-key link named after the
//! parent's primary-key attribute, unless the child already carries an
//! explicit link under that name.

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{LskError, LskResult};
use crate::scanner;

use super::types::{ParsedRecord, ParsedRecordBuilder, PrimaryKey};

const REF_PREFIX: &str = "REF:{";
const REF_SUFFIX: &str = "}";

/// Parse an XML document into records.
pub fn parse_records(xml: &str) -> LskResult<Vec<ParsedRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    // Parent primary-key context per open element; `None` at the root and
    // under elements without a placeholder.
    let mut stack: Vec<Option<PrimaryKey>> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Err(e) => {
                return Err(LskError::XmlParse {
                    position,
                    message: e.to_string(),
                })
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                if stack.is_empty() {
                    // Root element: container only.
                    stack.push(None);
                    continue;
                }
                let parent = stack.last().unwrap().clone();
                let record = build_record(position, &start, parent.as_ref())?;
                stack.push(record.primary_key().cloned());
                records.push(record);
            }
            Ok(Event::Empty(start)) => {
                if stack.is_empty() {
                    continue;
                }
                let parent = stack.last().unwrap().clone();
                let record = build_record(position, &start, parent.as_ref())?;
                records.push(record);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(_) => {}
        }
    }

    tracing::info!(records = records.len(), "XML record parsing complete");
    Ok(records)
}

fn build_record(
    position: u64,
    start: &BytesStart<'_>,
    parent: Option<&PrimaryKey>,
) -> LskResult<ParsedRecord> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut builder = ParsedRecordBuilder::new(&tag);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| LskError::XmlParse {
            position,
            message: format!("bad attribute on <{tag}>: {e}"),
        })?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| LskError::XmlParse {
                position,
                message: format!("bad attribute value on <{tag}>: {e}"),
            })?
            .trim()
            .to_string();
        if value.is_empty() {
            continue;
        }

        if scanner::is_placeholder(&value) {
            builder.set_primary_key(&name, &value);
        } else if let Some(target) = value
            .strip_prefix(REF_PREFIX)
            .and_then(|rest| rest.strip_suffix(REF_SUFFIX))
        {
            let target = target.trim();
            if target.is_empty() {
                tracing::warn!(attribute = %name, element = %tag, "empty reference, skipping link");
                continue;
            }
            builder.add_foreign_key(&name, target);
        } else {
            builder.add_attribute(&name, &value);
        }
    }

    if let Some(parent_pk) = parent {
        if !builder.has_foreign_key(&parent_pk.attribute) {
            builder.add_foreign_key(&parent_pk.attribute, &parent_pk.placeholder);
        }
    }

    Ok(builder.freeze())
}
