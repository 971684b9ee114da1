//! Index Module
//!
//! Secondary equality indexes over document fields.
//!
//! ## Responsibilities
//! - Build a field's index by full scan the first time it is queried
//! - Answer `field == value` lookups with ids in insertion order
//! - Collect fields touched by writes and rebuild them in one pass later
//!
//! Indexes are rebuilt wholesale rather than patched. A burst of writes to
//! the same field between two reconciliation passes costs one rebuild.

mod manager;

pub use manager::{IndexKey, IndexManager};
