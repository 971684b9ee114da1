//! # zmatstore
//!
//! An embedded JSON document store for generic CRUD services:
//! - In-memory document cache, authoritative for every read
//! - Lazily built secondary indexes with coalesced background rebuilds
//! - Write-behind persistence: chunked, atomic-rename flushes on a timer
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │              (one Collection per schema)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌────────────┐ ┌───────────┐  ┌───────────────┐
//!   │  Document  │ │   Index   │  │ Write-Behind  │
//!   │   Cache    │◀┤  Manager  │  │   Persister   │
//!   │  (RwLock)  │ │  (lazy)   │  │  (bg thread)  │
//!   └────────────┘ └───────────┘  └───────┬───────┘
//!                                         │
//!                                         ▼
//!                                 ┌───────────────┐
//!                                 │  {name}.json  │
//!                                 └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use zmatstore::{codec, Config, Engine};
//!
//! # fn main() -> zmatstore::Result<()> {
//! let engine = Engine::open(Config::builder().data_dir("./db").build())?;
//! let users = engine.collection("users")?;
//!
//! let id = users.create(codec::into_document(json!({ "name": "A" }))?)?;
//! assert_eq!(users.find_by_field("name", &json!("A")).len(), 1);
//! users.delete(id)?;
//!
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod schema;

pub mod cache;
pub mod codec;
pub mod collection;
pub mod engine;
pub mod index;
pub mod network;
pub mod persist;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::Document;
pub use collection::Collection;
pub use config::Config;
pub use engine::Engine;
pub use error::{Result, StoreError};
pub use schema::SchemaConfig;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of zmatstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
