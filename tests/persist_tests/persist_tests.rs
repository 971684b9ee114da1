//! Tests for write-behind persistence
//!
//! These tests verify:
//! - Dirty tracking and tick behavior
//! - Chunked flushes produce the exact collection file
//! - A write during an in-flight flush keeps the collection dirty
//! - Failed flushes are retried and never corrupt the file
//! - The background worker's tick, reconcile and shutdown paths

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;
use zmatstore::cache::DocumentCache;
use zmatstore::codec::{encode, into_document, read_file, Document, SnapshotWriter};
use zmatstore::persist::{Maintenance, Persister, Worker};
use zmatstore::{Result, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn doc(value: serde_json::Value) -> Document {
    into_document(value).unwrap()
}

fn setup(chunk_size: usize) -> (TempDir, DocumentCache, Persister) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("items.json");
    let persister = Persister::new(&path, chunk_size);
    let cache = DocumentCache::open(&path).unwrap();
    (temp_dir, cache, persister)
}

fn write(cache: &DocumentCache, persister: &Persister, value: serde_json::Value) -> u64 {
    let id = cache.insert(doc(value));
    persister.mark_dirty();
    id
}

// =============================================================================
// Dirty Tracking Tests
// =============================================================================

#[test]
fn test_new_persister_is_clean() {
    let (_temp, _cache, persister) = setup(100);
    assert!(!persister.is_dirty());
}

#[test]
fn test_mark_dirty_then_flush_is_clean() {
    let (_temp, cache, persister) = setup(100);

    write(&cache, &persister, json!({ "n": 1 }));
    assert!(persister.is_dirty());

    persister.flush(&cache).unwrap();
    assert!(!persister.is_dirty());
}

#[test]
fn test_tick_skips_when_clean() {
    let (_temp, cache, persister) = setup(100);

    assert!(!persister.tick(&cache));
    assert_eq!(persister.stats().flushes, 0);
}

#[test]
fn test_tick_flushes_when_dirty() {
    let (_temp, cache, persister) = setup(100);
    write(&cache, &persister, json!({ "n": 1 }));

    assert!(persister.tick(&cache));
    assert!(!persister.is_dirty());
    assert_eq!(persister.stats().flushes, 1);
    assert_eq!(persister.stats().last_record_count, 1);
}

// =============================================================================
// Flush Content Tests
// =============================================================================

#[test]
fn test_chunked_flush_writes_exact_file() {
    let (_temp, cache, persister) = setup(3);
    for n in 0..10 {
        write(&cache, &persister, json!({ "n": n }));
    }
    cache.remove(4).unwrap();
    persister.mark_dirty();

    let mut chunks = Vec::new();
    persister
        .flush_with_progress(&cache, |n| chunks.push(n))
        .unwrap();

    assert_eq!(chunks, vec![0, 1, 2]);

    let snapshot = cache.snapshot();
    let expected = encode(
        snapshot.last_id,
        snapshot.records.iter().map(|r| (r.id, r.document.as_ref())),
    )
    .unwrap();
    assert_eq!(fs::read(persister.path()).unwrap(), expected);
}

#[test]
fn test_flush_roundtrips_through_reopen() {
    let (temp, cache, persister) = setup(2);
    write(&cache, &persister, json!({ "name": "A" }));
    write(&cache, &persister, json!({ "name": "B" }));
    cache.remove(1).unwrap();
    persister.flush(&cache).unwrap();

    let reopened = DocumentCache::open(&temp.path().join("items.json")).unwrap();

    assert_eq!(reopened.last_id(), 2);
    assert_eq!(reopened.all(), cache.all());
}

// =============================================================================
// In-Flight Flush Tests
// =============================================================================

#[test]
fn test_write_during_flush_keeps_dirty() {
    let (_temp, cache, persister) = setup(1);
    write(&cache, &persister, json!({ "name": "A" }));
    write(&cache, &persister, json!({ "name": "B" }));

    let mut late_id = None;
    persister
        .flush_with_progress(&cache, |chunk| {
            if chunk == 0 {
                late_id = Some(write(&cache, &persister, json!({ "name": "late" })));
            }
        })
        .unwrap();

    // The flush's snapshot predates the late write
    let on_disk = read_file(persister.path()).unwrap().unwrap();
    assert_eq!(on_disk.records.len(), 2);
    assert!(persister.is_dirty());

    // The next tick picks it up
    assert!(persister.tick(&cache));
    assert!(!persister.is_dirty());
    let on_disk = read_file(persister.path()).unwrap().unwrap();
    assert!(on_disk.records.contains_key(&late_id.unwrap()));
}

#[test]
fn test_concurrent_writers_and_flushes_converge() {
    let (_temp, cache, persister) = setup(4);
    let cache = Arc::new(cache);
    let persister = Arc::new(persister);

    let writer = {
        let cache = Arc::clone(&cache);
        let persister = Arc::clone(&persister);
        thread::spawn(move || {
            for n in 0..200 {
                write(&cache, &persister, json!({ "n": n }));
            }
        })
    };

    while !writer.is_finished() {
        persister.tick(&cache);
    }
    writer.join().unwrap();
    persister.tick(&cache);

    assert!(!persister.is_dirty());
    let on_disk = read_file(persister.path()).unwrap().unwrap();
    assert_eq!(on_disk.records.len(), 200);
    assert_eq!(on_disk.last_id, 200);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failed_flush_stays_dirty_and_keeps_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("items.json");
    let cache = DocumentCache::open(&path).unwrap();
    let persister = Persister::new(&path, 10);
    let before = fs::read(&path).unwrap();

    // A directory where the temp file should go makes the flush fail
    fs::create_dir(SnapshotWriter::tmp_path_for(&path)).unwrap();
    write(&cache, &persister, json!({ "n": 1 }));

    assert!(matches!(
        persister.flush(&cache),
        Err(StoreError::Persistence(_))
    ));
    assert!(!persister.tick(&cache));
    assert!(persister.is_dirty());
    assert_eq!(persister.stats().failures, 2);
    assert_eq!(fs::read(&path).unwrap(), before);

    // Retry succeeds once the obstacle is gone
    fs::remove_dir(SnapshotWriter::tmp_path_for(&path)).unwrap();
    assert!(persister.tick(&cache));
    assert!(!persister.is_dirty());
}

#[test]
fn test_new_removes_leftover_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("items.json");
    let tmp = SnapshotWriter::tmp_path_for(&path);
    fs::write(&tmp, b"{\"last_id\":1,\"rec").unwrap();

    let _persister = Persister::new(&path, 10);

    assert!(!tmp.exists());
}

#[test]
fn test_flush_on_shutdown_only_when_dirty() {
    let (_temp, cache, persister) = setup(10);

    persister.flush_on_shutdown(&cache).unwrap();
    assert_eq!(persister.stats().flushes, 0);

    write(&cache, &persister, json!({ "n": 1 }));
    persister.flush_on_shutdown(&cache).unwrap();
    assert_eq!(persister.stats().flushes, 1);
}

// =============================================================================
// Worker Tests
// =============================================================================

#[derive(Default)]
struct Counters {
    ticks: AtomicUsize,
    reconciles: AtomicUsize,
    shutdowns: AtomicUsize,
}

#[derive(Clone, Default)]
struct CountingTask(Arc<Counters>);

impl Maintenance for CountingTask {
    fn tick(&self) {
        self.0.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn reconcile(&self) {
        self.0.reconciles.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) -> Result<()> {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_worker_ticks_on_interval() {
    let task = CountingTask::default();
    let counters = Arc::clone(&task.0);
    let worker = Worker::spawn("ticks", Duration::from_millis(10), task).unwrap();

    assert!(wait_for(|| counters.ticks.load(Ordering::SeqCst) >= 3));
    worker.shutdown().unwrap();
}

#[test]
fn test_worker_reconciles_on_request() {
    let task = CountingTask::default();
    let counters = Arc::clone(&task.0);
    let worker = Worker::spawn("reconcile", Duration::from_secs(3600), task).unwrap();

    worker.request_reconcile();

    assert!(wait_for(|| counters.reconciles.load(Ordering::SeqCst) >= 1));
    worker.shutdown().unwrap();
}

#[test]
fn test_worker_shutdown_runs_once() {
    let task = CountingTask::default();
    let counters = Arc::clone(&task.0);
    let worker = Worker::spawn("shutdown", Duration::from_secs(3600), task).unwrap();

    assert!(worker.is_running());
    worker.shutdown().unwrap();
    worker.shutdown().unwrap();

    assert!(!worker.is_running());
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(counters.ticks.load(Ordering::SeqCst), 0);
}
