//! AtlasFS Coordinator Binary
//!
//! Starts the client-facing TCP server of AtlasFS.

use std::path::PathBuf;
use std::sync::Arc;

use atlasfs::config::load_storage_servers;
use atlasfs::network::{CoordinatorService, Server};
use atlasfs::{Coordinator, CoordinatorConfig, StorageServerInfo};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasFS Coordinator
#[derive(Parser, Debug)]
#[command(name = "atlasfs-coordinator")]
#[command(about = "Splits uploaded files into parts and spreads them over storage nodes")]
#[command(version)]
struct Args {
    /// Data directory (ledger, scratch and download directories)
    #[arg(short, long, default_value = "./atlasfs_data")]
    data_dir: PathBuf,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// File listing storage nodes, one host:port per line
    #[arg(short, long)]
    servers: Option<PathBuf>,

    /// Storage node (host:port), repeatable; appended after --servers
    #[arg(short, long = "node")]
    nodes: Vec<StorageServerInfo>,

    /// Number of parts per file
    #[arg(short, long, default_value_t = atlasfs::config::DEFAULT_PART_COUNT)]
    parts: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasFS Coordinator v{}", atlasfs::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());
    tracing::info!("Listen address: {}", args.listen);

    let mut storage_nodes = match &args.servers {
        Some(path) => match load_storage_servers(path) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Vec::new(),
    };
    storage_nodes.extend(args.nodes);

    for (i, node) in storage_nodes.iter().enumerate() {
        tracing::info!("Storage node {}: {}", i + 1, node);
    }

    // Build config from args
    let config = CoordinatorConfig::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .storage_nodes(storage_nodes)
        .part_count(args.parts)
        .build();

    // Open coordinator
    let coordinator = match Coordinator::open(config.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("Failed to open coordinator: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(&config.listen_addr, CoordinatorService::new(coordinator)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Coordinator stopped");
}
