//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor loop (non-blocking, polls a shutdown flag)
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
