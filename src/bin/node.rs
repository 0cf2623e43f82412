//! AtlasFS Storage Node Binary
//!
//! Serves part files out of a local directory.

use std::path::PathBuf;

use atlasfs::network::Server;
use atlasfs::node::NodeService;
use atlasfs::NodeConfig;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasFS Storage Node
#[derive(Parser, Debug)]
#[command(name = "atlasfs-node")]
#[command(about = "Stores file parts for an AtlasFS coordinator")]
#[command(version)]
struct Args {
    /// Directory holding the part files
    #[arg(short, long, default_value = "./storage")]
    storage_dir: PathBuf,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5002")]
    listen: String,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasFS Storage Node v{}", atlasfs::VERSION);
    tracing::info!("Storage directory: {}", args.storage_dir.display());

    let config = NodeConfig::builder()
        .storage_dir(&args.storage_dir)
        .listen_addr(&args.listen)
        .build();

    let service = match NodeService::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open storage directory: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(&config.listen_addr, service) {
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

    tracing::info!("Storage node stopped");
}
