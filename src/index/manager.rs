//! Index Manager
//!
//! Lazily built field → value → {id} indexes.
//!
//! # API
//!
//! - `ensure(field, cache)` - Build the index for `field` if it is missing
//! - `query(field, value)` - Ids whose document has `field == value`
//! - `mark_dirty(fields)` - Schedule rebuilds after a write
//! - `reconcile(cache)` - Rebuild every scheduled index
//!
//! ## Concurrency
//! - `indexes`: RwLock; queries share it, builds swap whole indexes in
//! - `pending`: Mutex around the set of fields written since the last pass
//! - `reconcile_lock`: one reconciliation pass at a time, so an older
//!   rebuild can never overwrite a newer one
//!
//! `mark_dirty` records every written field, indexed or not. A pass skips
//! fields that have no index yet; those are built from scratch by the next
//! `ensure`, which holds the write lock while it scans so no write slips
//! between its scan and its insert unnoticed.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::cache::DocumentCache;
use crate::codec::Document;

/// Canonical key for an indexed value
///
/// The compact JSON text of the value: `1` and `"1"` stay distinct and
/// objects compare field by field (keys are kept sorted). Negative zero is
/// written as `0.0`, matching `Value` equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(String);

impl IndexKey {
    pub fn from_value(value: &Value) -> Self {
        if has_negative_zero(value) {
            IndexKey(without_negative_zero(value).to_string())
        } else {
            IndexKey(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// value → ids for one field
type FieldIndex = HashMap<IndexKey, BTreeSet<u64>>;

/// Secondary indexes for one collection
#[derive(Default)]
pub struct IndexManager {
    /// Materialized indexes by field name
    indexes: RwLock<HashMap<String, FieldIndex>>,

    /// Fields written since the last reconciliation pass
    pending: Mutex<BTreeSet<String>>,

    /// Serializes reconciliation passes
    reconcile_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for `field` if it does not exist yet
    ///
    /// Full scan of the cache, O(n) in records. Returns true if a build
    /// happened.
    pub fn ensure(&self, field: &str, cache: &DocumentCache) -> bool {
        if self.indexes.read().contains_key(field) {
            return false;
        }

        let mut indexes = self.indexes.write();
        if indexes.contains_key(field) {
            return false;
        }

        let index = Self::build(field, cache);
        tracing::debug!(
            "Built index on {:?}: {} distinct values",
            field,
            index.len()
        );
        indexes.insert(field.to_string(), index);
        true
    }

    /// Ids of documents whose `field` equals `value`, in insertion order
    ///
    /// Empty when nothing matches or when `field` has no index.
    pub fn query(&self, field: &str, value: &Value) -> Vec<u64> {
        self.indexes
            .read()
            .get(field)
            .and_then(|index| index.get(&IndexKey::from_value(value)))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Schedule a rebuild for each written field
    pub fn mark_dirty<'a, I>(&self, fields: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut pending = self.pending.lock();
        for field in fields {
            if !pending.contains(field) {
                pending.insert(field.clone());
            }
        }
    }

    /// Rebuild every index whose field was written since the last pass
    ///
    /// Returns the number of indexes rebuilt.
    pub fn reconcile(&self, cache: &DocumentCache) -> usize {
        let _pass = self.reconcile_lock.lock();
        let fields = std::mem::take(&mut *self.pending.lock());

        let mut rebuilt = 0;
        for field in fields {
            if !self.indexes.read().contains_key(&field) {
                continue;
            }

            let index = Self::build(&field, cache);
            self.indexes.write().insert(field, index);
            rebuilt += 1;
        }

        if rebuilt > 0 {
            tracing::debug!("Reconciled {} indexes", rebuilt);
        }
        rebuilt
    }

    /// Fields that currently have an index
    pub fn indexed_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.indexes.read().keys().cloned().collect();
        fields.sort();
        fields
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.read().contains_key(field)
    }

    /// Number of fields waiting for the next pass
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn build(field: &str, cache: &DocumentCache) -> FieldIndex {
        let mut index = FieldIndex::new();
        cache.scan(|id, document: &Document| {
            if let Some(value) = document.get(field) {
                index
                    .entry(IndexKey::from_value(value))
                    .or_default()
                    .insert(id);
            }
        });
        index
    }
}

fn is_negative_zero(number: &serde_json::Number) -> bool {
    number.is_f64() && number.as_f64().map_or(false, |f| f == 0.0 && f.is_sign_negative())
}

fn has_negative_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => is_negative_zero(n),
        Value::Array(items) => items.iter().any(has_negative_zero),
        Value::Object(fields) => fields.values().any(has_negative_zero),
        _ => false,
    }
}

fn without_negative_zero(value: &Value) -> Value {
    match value {
        Value::Number(n) if is_negative_zero(n) => Value::from(0.0),
        Value::Array(items) => Value::Array(items.iter().map(without_negative_zero).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), without_negative_zero(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
