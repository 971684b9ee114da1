//! Schema configuration
//!
//! Declares which collections exist and which of their fields are worth
//! indexing up front. Field types and validation rules are carried for the
//! layers that enforce them; the store itself trusts its input.
//!
//! ```json
//! {
//!   "storage": "json",
//!   "schemas": {
//!     "users": {
//!       "auth": true,
//!       "fields": {
//!         "email": { "type": "string", "validation": "email", "unique": true },
//!         "name":  { "type": "string", "indexed": true }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Storage backend named in the config; only `json` is supported
const JSON_STORAGE: &str = "json";

/// Top-level schema file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_storage")]
    pub storage: String,

    #[serde(default)]
    pub schemas: BTreeMap<String, CollectionSchema>,
}

/// One collection's declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Records of this collection are principals that get a token on create
    #[serde(default)]
    pub auth: bool,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// One declared field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,

    #[serde(default)]
    pub validation: Option<String>,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub indexed: bool,
}

fn default_storage() -> String {
    JSON_STORAGE.to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            schemas: BTreeMap::new(),
        }
    }
}

impl SchemaConfig {
    /// Load and validate a schema file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read schema file {:?}: {}", path, e))
        })?;
        Self::parse(&text)
    }

    /// Parse and validate schema JSON
    pub fn parse(text: &str) -> Result<Self> {
        let config: SchemaConfig = serde_json::from_str(text)
            .map_err(|e| StoreError::Config(format!("invalid schema file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a collection's schema
    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.schemas.get(name)
    }

    /// Declared collection names, sorted
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        if self.storage != JSON_STORAGE {
            return Err(StoreError::Config(format!(
                "unsupported storage type {:?}",
                self.storage
            )));
        }

        for name in self.schemas.keys() {
            if !is_valid_collection_name(name) {
                return Err(StoreError::Config(format!(
                    "invalid collection name {:?}",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl CollectionSchema {
    /// Fields whose indexes are built when the collection opens
    pub fn warm_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.unique || spec.indexed)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Collection names double as file names: `[A-Za-z0-9_-]+`
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
