//! Write-Behind Persistence Module
//!
//! Keeps the collection file in step with the cache without putting disk
//! I/O on the write path.
//!
//! ## Responsibilities
//! - Track whether the cache holds changes the file does not
//! - Flush the whole collection on a timer, in chunks, off the write path
//! - Run the background thread that also drives index reconciliation
//! - Final flush on shutdown
//!
//! ## State Machine
//! ```text
//!            mutation                tick, flush ok
//!   Clean ───────────────▶ Dirty ─────────────────▶ Clean
//!                           │  ▲
//!                           └──┘ tick, flush failed (logged, retried)
//! ```
//!
//! Dirtiness is a pair of counters rather than a flag. Every mutation bumps
//! the dirty epoch; a flush remembers the epoch it saw *before* taking its
//! snapshot and, once the file is safely renamed into place, raises the
//! clean epoch to that value and no further. A write that lands while a
//! flush is in progress therefore keeps the collection dirty.
//!
//! ## Durability
//! Anything written after the last successful flush is lost if the process
//! dies uncleanly. Callers that need a write on disk call `flush` themselves.

mod persister;
mod worker;

pub use persister::{FlushStats, Persister};
pub use worker::{Maintenance, Worker};
