//! Persister
//!
//! Dirty tracking and chunked flushes for one collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::{DocumentCache, Snapshot};
use crate::codec::SnapshotWriter;
use crate::error::{Result, StoreError};

/// Counters describing flush activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Successful flushes
    pub flushes: u64,

    /// Failed flush attempts
    pub failures: u64,

    /// Records written by the last successful flush
    pub last_record_count: u64,
}

/// Write-behind persister for one collection file
pub struct Persister {
    /// Collection file
    path: PathBuf,

    /// Records per chunk before yielding
    chunk_size: usize,

    /// Bumped by every mutation
    dirty_epoch: AtomicU64,

    /// Highest dirty epoch known to be on disk
    clean_epoch: AtomicU64,

    /// One flush at a time
    flush_lock: Mutex<()>,

    flushes: AtomicU64,
    failures: AtomicU64,
    last_record_count: AtomicU64,
}

impl Persister {
    /// Create a persister for `path`
    ///
    /// Removes a temporary file left behind by an interrupted flush; the
    /// collection file itself was never touched by that flush.
    pub fn new(path: &Path, chunk_size: usize) -> Self {
        let tmp_path = SnapshotWriter::tmp_path_for(path);
        if tmp_path.exists() {
            match fs::remove_file(&tmp_path) {
                Ok(()) => tracing::warn!("Removed incomplete flush file {:?}", tmp_path),
                Err(e) => tracing::warn!("Could not remove {:?}: {}", tmp_path, e),
            }
        }

        Self {
            path: path.to_path_buf(),
            chunk_size: chunk_size.max(1),
            dirty_epoch: AtomicU64::new(0),
            clean_epoch: AtomicU64::new(0),
            flush_lock: Mutex::new(()),
            flushes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_record_count: AtomicU64::new(0),
        }
    }

    /// Record that the cache changed
    pub fn mark_dirty(&self) {
        self.dirty_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// True while some mutation is not yet on disk
    pub fn is_dirty(&self) -> bool {
        self.dirty_epoch.load(Ordering::SeqCst) > self.clean_epoch.load(Ordering::SeqCst)
    }

    /// Timer callback: flush if dirty
    ///
    /// Failures are logged and left for the next tick; the cache stays
    /// authoritative either way. Returns true if a flush succeeded.
    pub fn tick(&self, cache: &DocumentCache) -> bool {
        if !self.is_dirty() {
            return false;
        }

        match self.flush(cache) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Flush of {:?} failed, will retry: {}", self.path, e);
                false
            }
        }
    }

    /// Write the whole collection to disk
    pub fn flush(&self, cache: &DocumentCache) -> Result<()> {
        self.flush_with_progress(cache, |_| {})
    }

    /// `flush`, calling `on_chunk` with the chunk number after each chunk
    pub fn flush_with_progress<F>(&self, cache: &DocumentCache, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(usize),
    {
        let _flushing = self.flush_lock.lock();
        let started = Instant::now();

        // Epoch before snapshot: anything counted here is in the snapshot.
        let epoch = self.dirty_epoch.load(Ordering::SeqCst);
        let snapshot = cache.snapshot();

        match self.write_snapshot(&snapshot, &mut on_chunk) {
            Ok(written) => {
                self.clean_epoch.fetch_max(epoch, Ordering::SeqCst);
                self.flushes.fetch_add(1, Ordering::Relaxed);
                self.last_record_count.store(written, Ordering::Relaxed);
                tracing::debug!(
                    "Flushed {} records to {:?} in {:?}",
                    written,
                    self.path,
                    started.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let _ = fs::remove_file(SnapshotWriter::tmp_path_for(&self.path));
                Err(StoreError::Persistence(e.to_string()))
            }
        }
    }

    /// Final flush before the collection goes away
    ///
    /// Best effort: skipped when nothing is dirty.
    pub fn flush_on_shutdown(&self, cache: &DocumentCache) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        tracing::info!("Flushing {:?} before shutdown", self.path);
        self.flush(cache)
    }

    pub fn stats(&self) -> FlushStats {
        FlushStats {
            flushes: self.flushes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_record_count: self.last_record_count.load(Ordering::Relaxed),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn write_snapshot<F>(&self, snapshot: &Snapshot, on_chunk: &mut F) -> Result<u64>
    where
        F: FnMut(usize),
    {
        let mut writer = SnapshotWriter::create(&self.path, snapshot.last_id)?;

        for (n, chunk) in snapshot.records.chunks(self.chunk_size).enumerate() {
            for record in chunk {
                writer.write_record(record.id, &record.document)?;
            }
            writer.end_chunk()?;
            on_chunk(n);
            std::thread::yield_now();
        }

        writer.finish()
    }
}
