//! Collection Reader
//!
//! Parses a collection file back into memory.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, StoreError};

use super::Document;

/// Decoded contents of a collection file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionImage {
    /// Highest id ever assigned
    pub last_id: u64,

    /// Live records, ordered by id
    pub records: BTreeMap<u64, Document>,
}

#[derive(Deserialize)]
struct CollectionFile {
    last_id: u64,
    #[serde(default)]
    records: BTreeMap<String, StoredRecord>,
}

#[derive(Deserialize)]
struct StoredRecord {
    document: Document,
}

/// Decode the bytes of a collection file
///
/// `path` is only used to label errors. Any parse failure, a non-numeric
/// record key, or a key above `last_id` is reported as `CorruptStore`.
pub fn decode(bytes: &[u8], path: &Path) -> Result<CollectionImage> {
    let file: CollectionFile = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::corrupt(path, e.to_string()))?;

    let mut records = BTreeMap::new();
    for (key, record) in file.records {
        let id: u64 = key
            .parse()
            .ok()
            .filter(|id: &u64| id.to_string() == key)
            .ok_or_else(|| StoreError::corrupt(path, format!("invalid record id {:?}", key)))?;

        if id == 0 || id > file.last_id {
            return Err(StoreError::corrupt(
                path,
                format!("record id {} outside 1..={}", id, file.last_id),
            ));
        }

        records.insert(id, record.document);
    }

    Ok(CollectionImage {
        last_id: file.last_id,
        records,
    })
}

/// Read and decode a collection file
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_file(path: &Path) -> Result<Option<CollectionImage>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    decode(&bytes, path).map(Some)
}
