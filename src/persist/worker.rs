//! Background Worker
//!
//! One thread per collection: periodic flushes, coalesced index
//! reconciliation, and the final flush at shutdown.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};

/// Work the background thread performs on behalf of a collection
pub trait Maintenance: Send + Sync + 'static {
    /// Flush timer fired
    fn tick(&self);

    /// Rebuild indexes touched since the last pass
    fn reconcile(&self);

    /// Last call before the thread exits
    fn shutdown(&self) -> Result<()>;
}

/// Handle to a collection's background thread
pub struct Worker {
    /// Wake-up for reconciliation; capacity 1 so bursts coalesce
    wake: Sender<()>,

    /// Shutdown request
    stop: Sender<()>,

    /// Thread handle, taken on shutdown
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Worker {
    /// Start the background thread
    pub fn spawn<M: Maintenance>(name: &str, interval: Duration, task: M) -> Result<Self> {
        let (wake_tx, wake_rx) = channel::bounded(1);
        let (stop_tx, stop_rx) = channel::bounded(1);
        let interval = interval.max(Duration::from_millis(1));

        let handle = thread::Builder::new()
            .name(format!("zmatstore-{}", name))
            .spawn(move || run(task, interval, wake_rx, stop_rx))?;

        Ok(Self {
            wake: wake_tx,
            stop: stop_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Ask for a reconciliation pass; cheap and never blocks
    pub fn request_reconcile(&self) {
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("Reconcile requested after worker exit");
            }
        }
    }

    /// Stop the thread and wait for its final flush
    ///
    /// Later calls return `Ok(())` without doing anything.
    pub fn shutdown(&self) -> Result<()> {
        let handle = match self.handle.lock().take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let _ = self.stop.try_send(());
        handle
            .join()
            .map_err(|_| StoreError::Persistence("background worker panicked".to_string()))?
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

fn run<M: Maintenance>(
    task: M,
    interval: Duration,
    wake: Receiver<()>,
    stop: Receiver<()>,
) -> Result<()> {
    let ticker = channel::tick(interval);

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(wake) -> msg => {
                if msg.is_err() {
                    break;
                }
                task.reconcile();
            }
            recv(ticker) -> _ => task.tick(),
        }
    }

    task.reconcile();
    task.shutdown()
}
