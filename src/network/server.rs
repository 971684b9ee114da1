//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, StoreError};

use super::Connection;

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP server for zmatstore
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the listen address; `run` binds on demand if this was skipped
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            StoreError::Network(format!("cannot bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until `shutdown` is signalled)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(StoreError::Network("listener not bound".to_string())),
        };

        tracing::info!("Listening on {}", listener.local_addr()?);

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Server shutting down");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Flag that stops the accept loop; clone it into a signal handler
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_connections {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                addr,
                active
            );
            drop(stream);
            return;
        }

        let engine = Arc::clone(&self.engine);
        let shutdown = Arc::clone(&self.shutdown);
        let active_connections = Arc::clone(&self.active_connections);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", addr))
            .spawn(move || {
                let result = Connection::new(stream, engine).and_then(|mut conn| {
                    conn.set_timeouts(read_ms, write_ms)?;
                    conn.handle(&shutdown)
                });
                if let Err(e) = result {
                    tracing::debug!("Connection {} ended with error: {}", addr, e);
                }
                active_connections.fetch_sub(1, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Could not spawn handler for {}: {}", addr, e);
        }
    }
}
