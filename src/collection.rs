//! Collection Module
//!
//! The store façade: one named collection backed by one file.
//!
//! ## Responsibilities
//! - create / view / update / delete / find_by_field
//! - Route every write through cache → index manager → persister
//! - Own the background worker and shut it down cleanly

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde_json::Value;

use crate::cache::{DocumentCache, Record};
use crate::codec::{self, Document};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::index::IndexManager;
use crate::persist::{FlushStats, Maintenance, Persister, Worker};
use crate::schema::is_valid_collection_name;

/// State shared between a collection and its background worker
struct Shared {
    cache: DocumentCache,
    indexes: IndexManager,
    persister: Persister,
}

impl Maintenance for Arc<Shared> {
    fn tick(&self) {
        self.persister.tick(&self.cache);
    }

    fn reconcile(&self) {
        self.indexes.reconcile(&self.cache);
    }

    fn shutdown(&self) -> Result<()> {
        self.persister.flush_on_shutdown(&self.cache)
    }
}

/// A named document collection
///
/// ## Consistency
/// - Each create/update/delete is atomic with respect to every other
///   in-memory operation (the cache's write lock)
/// - `view` always sees the latest write
/// - `find_by_field` may miss a document written since the last index
///   reconciliation, but never returns a deleted document or one whose
///   field no longer matches: candidates are re-checked against the cache
/// - Writes reach disk on the next flush tick, an explicit `flush`, or
///   `close`
pub struct Collection {
    /// Collection name (also the file stem)
    name: String,

    /// Cache, indexes and persister
    shared: Arc<Shared>,

    /// Background flush / reconcile thread
    worker: Worker,

    /// Close flag; writers hold a read guard from the check until their
    /// write is marked dirty, so `close` waits for them before the final flush
    closed: RwLock<bool>,
}

impl Collection {
    /// Open or create the collection `name` under `config.data_dir`
    pub fn open(name: &str, config: &Config) -> Result<Self> {
        Self::open_with_indexes(name, config, &[])
    }

    /// Open a collection and build indexes for `warm_fields` straight away
    pub fn open_with_indexes(name: &str, config: &Config, warm_fields: &[String]) -> Result<Self> {
        if !is_valid_collection_name(name) {
            return Err(StoreError::Config(format!(
                "invalid collection name {:?}",
                name
            )));
        }

        fs::create_dir_all(&config.data_dir)?;
        let path = Self::file_path(&config.data_dir, name);

        let persister = Persister::new(&path, config.flush_chunk_size);
        let cache = DocumentCache::open(&path)?;
        let indexes = IndexManager::new();
        for field in warm_fields {
            indexes.ensure(field, &cache);
        }

        let shared = Arc::new(Shared {
            cache,
            indexes,
            persister,
        });
        let worker = Worker::spawn(name, config.flush_interval(), Arc::clone(&shared))?;

        tracing::info!(
            "Opened collection {:?}: {} records, last_id={}",
            name,
            shared.cache.len(),
            shared.cache.last_id()
        );

        Ok(Self {
            name: name.to_string(),
            shared,
            worker,
            closed: RwLock::new(false),
        })
    }

    /// File backing collection `name` inside `data_dir`
    pub fn file_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(format!("{}.json", name))
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Store a new document and return its id
    pub fn create(&self, document: Document) -> Result<u64> {
        let _open = self.write_gate()?;
        codec::check_document(&document)?;

        let fields: Vec<String> = document.keys().cloned().collect();
        let id = self.shared.cache.insert(document);
        self.after_write(&fields);

        tracing::trace!("{}: created record {}", self.name, id);
        Ok(id)
    }

    /// Get a document by id
    pub fn view(&self, id: u64) -> Result<Document> {
        self.shared
            .cache
            .get(id)
            .map(|document| document.as_ref().clone())
    }

    /// Merge `partial` into the document at `id` and return the result
    ///
    /// An empty `partial` changes nothing and marks nothing dirty.
    pub fn update(&self, id: u64, partial: Document) -> Result<Document> {
        let _open = self.write_gate()?;
        codec::check_document(&partial)?;

        let fields: Vec<String> = partial.keys().cloned().collect();
        let document = self.shared.cache.update(id, partial)?;
        if !fields.is_empty() {
            self.after_write(&fields);
        }

        Ok(document.as_ref().clone())
    }

    /// Remove the document at `id`
    pub fn delete(&self, id: u64) -> Result<()> {
        let _open = self.write_gate()?;

        let removed = self.shared.cache.remove(id)?;
        let fields: Vec<String> = removed.keys().cloned().collect();
        self.after_write(&fields);

        tracing::trace!("{}: deleted record {}", self.name, id);
        Ok(())
    }

    /// Documents whose `field` equals `value`, in insertion order
    ///
    /// Builds the field's index on first use. No match is an empty vec.
    pub fn find_by_field(&self, field: &str, value: &Value) -> Vec<Document> {
        let shared = &self.shared;
        shared.indexes.ensure(field, &shared.cache);

        shared
            .indexes
            .query(field, value)
            .into_iter()
            .filter_map(|id| shared.cache.get(id).ok())
            .filter(|document| document.get(field) == Some(value))
            .map(|document| document.as_ref().clone())
            .collect()
    }

    /// All live records in insertion order
    pub fn records(&self) -> Vec<Record> {
        self.shared.cache.all()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Write the collection to disk now
    pub fn flush(&self) -> Result<()> {
        self.shared.persister.flush(&self.shared.cache)
    }

    /// Rebuild stale indexes now instead of waiting for the worker
    pub fn reconcile_indexes(&self) -> usize {
        self.shared.indexes.reconcile(&self.shared.cache)
    }

    /// Stop the background worker and flush outstanding writes
    ///
    /// Reads keep working afterwards; writes fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        {
            let mut closed = self.closed.write();
            if *closed {
                return Ok(());
            }
            *closed = true;
        }
        tracing::debug!("Closing collection {:?}", self.name);
        self.worker.shutdown()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.shared.cache.path()
    }

    pub fn len(&self) -> usize {
        self.shared.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.cache.is_empty()
    }

    /// Highest id ever assigned
    pub fn last_id(&self) -> u64 {
        self.shared.cache.last_id()
    }

    /// True while some write has not reached disk
    pub fn is_dirty(&self) -> bool {
        self.shared.persister.is_dirty()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    pub fn flush_stats(&self) -> FlushStats {
        self.shared.persister.stats()
    }

    /// Fields that currently have an index
    pub fn indexed_fields(&self) -> Vec<String> {
        self.shared.indexes.indexed_fields()
    }

    /// Fields written since the last index reconciliation
    pub fn pending_index_count(&self) -> usize {
        self.shared.indexes.pending_count()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Read guard on the close flag, or `Closed`
    fn write_gate(&self) -> Result<RwLockReadGuard<'_, bool>> {
        let closed = self.closed.read();
        if *closed {
            return Err(StoreError::Closed);
        }
        Ok(closed)
    }

    fn after_write(&self, fields: &[String]) {
        self.shared.indexes.mark_dirty(fields);
        self.shared.persister.mark_dirty();
        self.worker.request_reconcile();
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Final flush of {:?} failed: {}", self.name, e);
        }
    }
}
