//! Storage node connection handler
//!
//! One command per connection: read it, serve it, reply, close.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NodeConfig;
use crate::error::{AtlasError, Result};
use crate::network::Service;
use crate::protocol::{
    copy_exact, read_node_request, write_length, write_reply, write_string, NodeRequest,
    FAILURE, PART_FOUND, PART_NOT_FOUND, PART_STORED, STORE_FAILED_PREFIX, SUCCESS,
    UNKNOWN_COMMAND_PREFIX,
};

use super::PartStore;

/// Serves store / fetch / delete requests against a [`PartStore`]
pub struct NodeService {
    store: Arc<PartStore>,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
}

impl NodeService {
    pub fn new(store: Arc<PartStore>) -> Self {
        Self {
            store,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }

    /// Build from a node config, opening the storage root
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let store = Arc::new(PartStore::open(&config.storage_dir)?);
        Ok(Self {
            store,
            read_timeout_ms: config.read_timeout_ms,
            write_timeout_ms: config.write_timeout_ms,
        })
    }

    /// Get the underlying part store
    pub fn store(&self) -> &Arc<PartStore> {
        &self.store
    }

    fn execute<W: Write>(
        &self,
        request: NodeRequest,
        reader: &mut BufReader<TcpStream>,
        writer: &mut W,
        peer: &str,
    ) -> Result<()> {
        match request {
            NodeRequest::Store { part_name, length } => {
                match self.store.store(&part_name, length, reader) {
                    Ok(written) => {
                        tracing::info!("Stored part {} ({} bytes) from {}", part_name, written, peer);
                        write_reply(writer, PART_STORED)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to store part {} from {}: {}", part_name, peer, e);
                        write_reply(writer, &format!("{}{}", STORE_FAILED_PREFIX, e))
                    }
                }
            }

            NodeRequest::GetPart { part_name } => match self.store.open_part(&part_name) {
                Ok(Some((mut file, length))) => {
                    write_string(writer, PART_FOUND)?;
                    write_length(writer, length)?;
                    copy_exact(&mut file, writer, length)?;
                    writer.flush()?;
                    tracing::debug!("Served part {} ({} bytes) to {}", part_name, length, peer);
                    Ok(())
                }
                Ok(None) => {
                    tracing::debug!("Part {} not found for {}", part_name, peer);
                    write_reply(writer, PART_NOT_FOUND)
                }
                Err(e) => {
                    tracing::warn!("Cannot open part {}: {}", part_name, e);
                    write_reply(writer, PART_NOT_FOUND)
                }
            },

            NodeRequest::DeletePart { part_name } => match self.store.delete(&part_name) {
                Ok(true) => {
                    tracing::info!("Deleted part {}", part_name);
                    write_reply(writer, SUCCESS)
                }
                Ok(false) => {
                    tracing::debug!("Delete of absent part {}", part_name);
                    write_reply(writer, FAILURE)
                }
                Err(e) => {
                    tracing::warn!("Failed to delete part {}: {}", part_name, e);
                    write_reply(writer, FAILURE)
                }
            },
        }
    }
}

impl Service for NodeService {
    fn name(&self) -> &'static str {
        "node"
    }

    fn serve(&self, stream: TcpStream) -> Result<()> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        if self.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(self.read_timeout_ms)))?;
        }
        if self.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(self.write_timeout_ms)))?;
        }

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        let request = match read_node_request(&mut reader) {
            Ok(request) => request,
            Err(AtlasError::UnknownCommand(keyword)) => {
                tracing::warn!("Unknown command {:?} from {}", keyword, peer);
                return write_reply(&mut writer, &format!("{}{}", UNKNOWN_COMMAND_PREFIX, keyword));
            }
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Peer {} closed before sending a command", peer);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::trace!("Received {:?} from {}", request, peer);
        self.execute(request, &mut reader, &mut writer, &peer)
    }
}
