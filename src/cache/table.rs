//! Document Cache implementation
//!
//! BTreeMap-based record table with RwLock for concurrency.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::{self, Document, SnapshotWriter};
use crate::error::{Result, StoreError};

use super::{Record, Snapshot};

struct CacheState {
    last_id: u64,
    records: BTreeMap<u64, Arc<Document>>,
}

/// In-memory id → document table for one collection
pub struct DocumentCache {
    /// Collection file backing this cache
    path: PathBuf,

    /// Records and id counter (many readers, one writer)
    state: RwLock<CacheState>,
}

impl DocumentCache {
    /// Load the collection file at `path` into memory
    ///
    /// If the file does not exist an empty collection is created and its
    /// skeleton written straight away, so the file always exists once the
    /// cache does. A file that exists but does not parse is an error; it is
    /// never replaced.
    pub fn open(path: &Path) -> Result<Self> {
        let image = match codec::read_file(path)? {
            Some(image) => {
                tracing::debug!(
                    "Loaded {} records from {:?} (last_id={})",
                    image.records.len(),
                    path,
                    image.last_id
                );
                image
            }
            None => {
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir)?;
                }
                SnapshotWriter::create(path, 0)?.finish()?;
                tracing::info!("Created empty collection file {:?}", path);
                Default::default()
            }
        };

        let records = image
            .records
            .into_iter()
            .map(|(id, document)| (id, Arc::new(document)))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(CacheState {
                last_id: image.last_id,
                records,
            }),
        })
    }

    /// Get a document by id
    pub fn get(&self, id: u64) -> Result<Arc<Document>> {
        self.state
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    /// Store a new document under the next id and return that id
    pub fn insert(&self, document: Document) -> u64 {
        let mut state = self.state.write();
        let id = state.last_id + 1;
        state.records.insert(id, Arc::new(document));
        state.last_id = id;
        id
    }

    /// Merge `partial` into the document at `id`, field by field
    ///
    /// Fields in `partial` overwrite existing ones; all others are kept.
    /// Returns the merged document.
    pub fn update(&self, id: u64, partial: Document) -> Result<Arc<Document>> {
        let mut state = self.state.write();
        let entry = state
            .records
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;

        if !partial.is_empty() {
            let document = Arc::make_mut(entry);
            for (field, value) in partial {
                document.insert(field, value);
            }
        }

        Ok(Arc::clone(entry))
    }

    /// Remove the document at `id` and return it
    ///
    /// `last_id` is left alone so the id is never handed out again.
    pub fn remove(&self, id: u64) -> Result<Arc<Document>> {
        self.state
            .write()
            .records
            .remove(&id)
            .ok_or(StoreError::NotFound { id })
    }

    /// All records in insertion order
    pub fn all(&self) -> Vec<Record> {
        self.state
            .read()
            .records
            .iter()
            .map(|(&id, document)| Record {
                id,
                document: Arc::clone(document),
            })
            .collect()
    }

    /// Consistent copy of `last_id` and all records
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            last_id: state.last_id,
            records: state
                .records
                .iter()
                .map(|(&id, document)| Record {
                    id,
                    document: Arc::clone(document),
                })
                .collect(),
        }
    }

    /// Visit every record in id order while holding the read lock
    pub fn scan<F>(&self, mut visit: F)
    where
        F: FnMut(u64, &Document),
    {
        let state = self.state.read();
        for (&id, document) in state.records.iter() {
            visit(id, document);
        }
    }

    /// Highest id ever assigned
    pub fn last_id(&self) -> u64 {
        self.state.read().last_id
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Collection file backing this cache
    pub fn path(&self) -> &Path {
        &self.path
    }
}
