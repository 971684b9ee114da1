//! Codec Module
//!
//! Serializes collections to and from the on-disk JSON text format.
//!
//! ## Responsibilities
//! - Stream a collection snapshot to disk one record at a time
//! - Parse a collection file back into records and `last_id`
//! - Reject documents the parser could not read back
//!
//! ## File Format
//! ```text
//! {"last_id":2,"records":{
//! "1":{"document":{"name":"A"},"indexes":{}},
//! "2":{"document":{"name":"B"},"indexes":{}}
//! }}
//! ```
//!
//! One record per line, ids ascending. Object keys inside documents are
//! written in sorted order, so re-encoding a decoded file reproduces it
//! byte for byte. Secondary indexes are never persisted: the `indexes`
//! slot is always written empty and ignored when reading.

mod reader;
mod writer;

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

pub use reader::{decode, read_file, CollectionImage};
pub use writer::{encode, SnapshotWriter};

/// A schema-less document: field name → JSON value
pub type Document = Map<String, Value>;

/// Deepest nesting accepted inside a document.
///
/// serde_json refuses to parse input nested more than 128 levels and the
/// file wraps every document in four levels of its own.
pub const MAX_NESTING: usize = 64;

/// Check that a document can be written and read back
pub fn check_document(document: &Document) -> Result<()> {
    for value in document.values() {
        check_value(value, 1)?;
    }
    Ok(())
}

fn check_value(value: &Value, depth: usize) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(StoreError::InvalidDocument(format!(
            "nesting deeper than {} levels",
            MAX_NESTING
        )));
    }

    match value {
        Value::Array(items) => items.iter().try_for_each(|v| check_value(v, depth + 1)),
        Value::Object(fields) => fields.values().try_for_each(|v| check_value(v, depth + 1)),
        _ => Ok(()),
    }
}

/// Turn an arbitrary JSON value into a document, if it is an object
pub fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
