//! Engine Module
//!
//! Owns every collection of one data directory.
//!
//! ## Responsibilities
//! - Open collections lazily, on first access by name
//! - Restrict names to the schema (when one is configured) and pre-warm
//!   the indexes it declares
//! - Route protocol commands to the right collection
//! - Flush and close everything on shutdown

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::collection::Collection;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::protocol::Command;
use crate::schema::SchemaConfig;

/// The set of collections behind one data directory
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Declared collections, if any; `None` serves any valid name
    schema: Option<SchemaConfig>,

    /// Collections opened so far
    collections: RwLock<HashMap<String, Arc<Collection>>>,

    /// Set by `close`, under the `collections` write lock
    closed: AtomicBool,
}

impl Engine {
    /// Open an engine that serves any collection name
    pub fn open(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Open an engine restricted to the collections in `schema`
    pub fn open_with_schema(config: Config, schema: SchemaConfig) -> Result<Self> {
        Self::build(config, Some(schema))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    fn build(config: Config, schema: Option<SchemaConfig>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        tracing::info!(
            "Engine ready at {:?} ({} declared collections)",
            config.data_dir,
            schema.as_ref().map(|s| s.schemas.len()).unwrap_or(0)
        );

        Ok(Self {
            config,
            schema,
            collections: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Get a collection, opening it on first access
    ///
    /// Once the engine is closed no new collection is opened: `Closed`.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        if let Some(collection) = self.collections.read().get(name) {
            return Ok(Arc::clone(collection));
        }

        let warm_fields = match &self.schema {
            Some(schema) => schema
                .get(name)
                .map(|declared| declared.warm_fields())
                .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?,
            None => Vec::new(),
        };

        let mut collections = self.collections.write();
        if let Some(collection) = collections.get(name) {
            return Ok(Arc::clone(collection));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        let collection = Arc::new(Collection::open_with_indexes(
            name,
            &self.config,
            &warm_fields,
        )?);
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Execute a command
    ///
    /// Routes commands to the addressed collection. Results are JSON:
    /// - CREATE → `{"id": n}`
    /// - VIEW / UPDATE → the document
    /// - DELETE → `true`
    /// - FIND → array of documents
    /// - PING → `"PONG"`
    pub fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::Create {
                collection,
                document,
            } => {
                let id = self.collection(&collection)?.create(document)?;
                Ok(json!({ "id": id }))
            }
            Command::View { collection, id } => {
                let document = self.collection(&collection)?.view(id)?;
                Ok(Value::Object(document))
            }
            Command::Update {
                collection,
                id,
                partial,
            } => {
                let document = self.collection(&collection)?.update(id, partial)?;
                Ok(Value::Object(document))
            }
            Command::Delete { collection, id } => {
                self.collection(&collection)?.delete(id)?;
                Ok(Value::Bool(true))
            }
            Command::Find {
                collection,
                field,
                value,
            } => {
                let documents = self.collection(&collection)?.find_by_field(&field, &value);
                Ok(Value::Array(
                    documents.into_iter().map(Value::Object).collect(),
                ))
            }
            Command::Ping => Ok(Value::String("PONG".to_string())),
        }
    }

    /// Flush every open collection
    ///
    /// Tries all of them; returns the first error.
    pub fn flush_all(&self) -> Result<()> {
        let mut first_error = None;
        for collection in self.open_collections() {
            if let Err(e) = collection.flush() {
                tracing::error!("Flush of {:?} failed: {}", collection.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Close the engine gracefully
    ///
    /// Stops every background worker after a final flush. Returns the first
    /// error; every collection is attempted.
    pub fn close(&self) -> Result<()> {
        let collections: Vec<Arc<Collection>> = {
            let collections = self.collections.write();
            self.closed.store(true, Ordering::SeqCst);
            collections.values().cloned().collect()
        };

        let mut first_error = None;
        for collection in collections {
            if let Err(e) = collection.close() {
                tracing::error!("Closing {:?} failed: {}", collection.name(), e);
                first_error.get_or_insert(e);
            }
        }
        tracing::info!("Engine closed");
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Names of the collections opened so far, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn schema(&self) -> Option<&SchemaConfig> {
        self.schema.as_ref()
    }

    fn open_collections(&self) -> Vec<Arc<Collection>> {
        self.collections.read().values().cloned().collect()
    }
}
