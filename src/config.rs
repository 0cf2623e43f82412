//! Configuration for AtlasFS
//!
//! Centralized configuration with sensible defaults, one config per process
//! role (coordinator, storage node), plus the static storage server list.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AtlasError, Result};

/// Default number of parts a file is split into
pub const DEFAULT_PART_COUNT: usize = 2;

// =============================================================================
// Storage Server Info
// =============================================================================

/// Address of one storage node, as listed in the server list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageServerInfo {
    pub host: String,
    pub port: u16,
}

impl StorageServerInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for StorageServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for StorageServerInfo {
    type Err = AtlasError;

    /// Parse "host:port"
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AtlasError::Config(format!("expected host:port, got {:?}", s)))?;

        if host.is_empty() {
            return Err(AtlasError::Config(format!("missing host in {:?}", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| AtlasError::Config(format!("invalid port in {:?}: {}", s, e)))?;

        Ok(Self::new(host, port))
    }
}

/// Load the static storage server list
///
/// One `host:port` per line. Blank lines and lines starting with `#` are
/// ignored; any other malformed line fails the whole load.
pub fn load_storage_servers(path: &Path) -> Result<Vec<StorageServerInfo>> {
    let contents = fs::read_to_string(path).map_err(|e| {
        AtlasError::Config(format!("cannot read server list {}: {}", path.display(), e))
    })?;

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(StorageServerInfo::from_str)
        .collect()
}

// =============================================================================
// Coordinator Configuration
// =============================================================================

/// Configuration for the coordinator process
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for coordinator state
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── file_mapping.txt   (ledger)
    ///     ├── tmp/               (per-operation scratch directories)
    ///     └── download/          (assembled files served to clients)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Distribution Configuration
    // -------------------------------------------------------------------------
    /// Storage nodes, part `i` goes to node `i`
    pub storage_nodes: Vec<StorageServerInfo>,

    /// Number of parts each file is split into
    pub part_count: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for clients
    pub listen_addr: String,

    /// Connect timeout towards storage nodes (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read timeout towards storage nodes (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Write timeout towards storage nodes (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// Idle timeout for client connections (milliseconds, 0 = none)
    pub client_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlasfs_data"),
            storage_nodes: Vec::new(),
            part_count: DEFAULT_PART_COUNT,
            listen_addr: "127.0.0.1:5000".to_string(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            client_timeout_ms: 0,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Reject configurations the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.part_count == 0 {
            return Err(AtlasError::Config(
                "part_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for CoordinatorConfig
#[derive(Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Set the data directory (root for ledger and scratch files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Replace the storage node list
    pub fn storage_nodes(mut self, nodes: Vec<StorageServerInfo>) -> Self {
        self.config.storage_nodes = nodes;
        self
    }

    /// Add one storage node at the end of the list
    pub fn storage_node(mut self, node: StorageServerInfo) -> Self {
        self.config.storage_nodes.push(node);
        self
    }

    /// Set the number of parts per file
    pub fn part_count(mut self, count: usize) -> Self {
        self.config.part_count = count;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the node connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the node read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the node write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the client idle timeout (in milliseconds)
    pub fn client_timeout_ms(mut self, ms: u64) -> Self {
        self.config.client_timeout_ms = ms;
        self
    }

    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}

// =============================================================================
// Storage Node Configuration
// =============================================================================

/// Configuration for a storage node process
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding part files, named exactly as received
    pub storage_dir: PathBuf,

    /// TCP listen address
    pub listen_addr: String,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./storage"),
            listen_addr: "127.0.0.1:5002".to_string(),
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl NodeConfig {
    /// Create a new config builder
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }
}

/// Builder for NodeConfig
#[derive(Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = path.into();
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}
