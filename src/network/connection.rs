//! Client Session
//!
//! Serves one client socket: a request frame in, one response frame out,
//! until the client goes away or the server stops.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::protocol::{read_command, write_response, Response};

/// One client of the document server
pub struct Connection {
    /// Inbound command frames
    requests: BufReader<TcpStream>,

    /// Outbound response frames
    responses: BufWriter<TcpStream>,

    /// Collections served to this client
    engine: Arc<Engine>,

    /// `ip:port` of the client, for log lines
    peer_addr: String,
}

/// Why a session ended without an error
enum Ending {
    Disconnected,
    Idle,
}

impl Connection {
    /// Wrap an accepted socket
    ///
    /// The socket is switched back to blocking mode (the listener polls) and
    /// split into a read half and a write half.
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => "unknown".to_string(),
        };

        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        let requests = BufReader::new(stream.try_clone()?);

        Ok(Self {
            requests,
            responses: BufWriter::new(stream),
            engine,
            peer_addr,
        })
    }

    /// Apply idle and send timeouts; zero leaves the OS default
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let idle = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        let send = (write_ms > 0).then(|| Duration::from_millis(write_ms));

        if idle.is_some() {
            self.requests.get_ref().set_read_timeout(idle)?;
        }
        if send.is_some() {
            self.responses.get_ref().set_write_timeout(send)?;
        }
        Ok(())
    }

    /// Serve requests until the client leaves, idles out, or `shutdown` is set
    ///
    /// A malformed frame gets an ERROR response and ends the session, since
    /// the stream position can no longer be trusted.
    pub fn handle(&mut self, shutdown: &AtomicBool) -> Result<()> {
        tracing::debug!("Session opened for {}", self.peer_addr);

        while !shutdown.load(Ordering::Relaxed) {
            let command = match read_command(&mut self.requests) {
                Ok(command) => command,
                Err(e) => return self.end_on_read_error(e),
            };
            tracing::trace!("{} -> {:?}", self.peer_addr, command);

            let response = Response::from_result(self.engine.execute(command));
            if let Err(e) = write_response(&mut self.responses, &response) {
                return match classify(&e) {
                    Some(Ending::Disconnected) | Some(Ending::Idle) => {
                        tracing::debug!("{} left before its response was sent", self.peer_addr);
                        Ok(())
                    }
                    None => {
                        tracing::warn!("Sending to {} failed: {}", self.peer_addr, e);
                        Err(e)
                    }
                };
            }
        }

        Ok(())
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn end_on_read_error(&mut self, error: StoreError) -> Result<()> {
        match classify(&error) {
            Some(Ending::Disconnected) => {
                tracing::debug!("{} disconnected", self.peer_addr);
                Ok(())
            }
            Some(Ending::Idle) => {
                tracing::debug!("{} idle past the read timeout", self.peer_addr);
                Ok(())
            }
            None => {
                tracing::warn!("Bad request from {}: {}", self.peer_addr, error);
                let _ = write_response(&mut self.responses, &Response::error(&error.to_string()));
                Err(error)
            }
        }
    }
}

fn classify(error: &StoreError) -> Option<Ending> {
    let StoreError::Io(io) = error else {
        return None;
    };
    match io.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Some(Ending::Disconnected),
        // Unix reports an expired read timeout as WouldBlock, Windows as TimedOut
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Some(Ending::Idle),
        _ => None,
    }
}
