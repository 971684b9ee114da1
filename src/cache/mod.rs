//! Document Cache Module
//!
//! The authoritative in-memory copy of a collection.
//!
//! ## Responsibilities
//! - Load the collection file once, when the collection is opened
//! - Assign ids (`last_id + 1`, never reused)
//! - Point reads, inserts, shallow-merge updates, removals
//! - Cheap ordered snapshots for the flush and index-build paths
//!
//! ## Data Structure Choice
//! `BTreeMap<u64, Arc<Document>>` behind a `parking_lot::RwLock`:
//! - Ids only grow, so key order is insertion order
//! - Documents are shared with snapshots by refcount; an update that races
//!   a flush clones the one document it touches (copy-on-write)

mod table;

use std::sync::Arc;

use crate::codec::Document;

pub use table::DocumentCache;

/// A stored record: id plus its document
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u64,
    pub document: Arc<Document>,
}

/// Point-in-time copy of a collection, used by the flush path
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Highest id assigned when the snapshot was taken
    pub last_id: u64,

    /// Live records ordered by id
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
