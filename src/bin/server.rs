//! zmatstore Server Binary
//!
//! Starts the TCP server for zmatstore.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use zmatstore::network::Server;
use zmatstore::{Config, Engine, SchemaConfig};

/// zmatstore Server
#[derive(Parser, Debug)]
#[command(name = "zmatstore-server")]
#[command(about = "Embedded JSON document store served over TCP")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./db")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3232")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Schema config (JSON); without one any collection name is served
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Background flush period in milliseconds
    #[arg(short = 'f', long, default_value = "10000")]
    flush_interval_ms: u64,

    /// Records written per flush chunk
    #[arg(short = 'c', long, default_value = "100")]
    chunk_size: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zmatstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("zmatstore Server v{}", zmatstore::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .flush_interval_ms(args.flush_interval_ms)
        .flush_chunk_size(args.chunk_size)
        .build();

    // Open engine
    let opened = match &args.schema {
        Some(path) => SchemaConfig::from_file(path).and_then(|schema| {
            tracing::info!(
                "Schema {:?}: {}",
                path,
                schema.collection_names().collect::<Vec<_>>().join(", ")
            );
            Engine::open_with_schema(config.clone(), schema)
        }),
        None => Engine::open(config.clone()),
    };
    let engine = match opened {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    let mut server = Server::new(config, Arc::clone(&engine));

    // Ctrl+C / SIGTERM stop the accept loop; the final flush runs below
    let shutdown_flag = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal, initiating shutdown...");
        shutdown_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!("Could not install signal handler: {}", e);
    }

    let served = server.run();
    if let Err(e) = &served {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Shutdown flush failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
    if served.is_err() {
        std::process::exit(1);
    }
}
