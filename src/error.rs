//! Error types for zmatstore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for zmatstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Document Errors
    // -------------------------------------------------------------------------
    #[error("Record {id} not found")]
    NotFound { id: u64 },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt store file {path:?}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Collection is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Build a `CorruptStore` error for the given file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the recoverable "no such record" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
