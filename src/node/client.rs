//! Storage node client
//!
//! Used by the coordinator to push, pull and delete parts. Each call opens
//! its own connection, matching the node's one-command-per-connection model.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::config::{CoordinatorConfig, StorageServerInfo};
use crate::error::{AtlasError, Result};
use crate::protocol::{
    copy_exact, read_part_reply, read_string, write_node_request, NodeRequest, PartReply,
    FAILURE, PART_STORED, SUCCESS,
};

/// Result of fetching a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Part written to the destination path
    Found { length: u64 },

    /// The node does not hold the part
    NotFound,
}

/// Blocking client for the storage node protocol
#[derive(Debug, Clone, Default)]
pub struct NodeClient {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl NodeClient {
    /// Create a client; a timeout of 0 means none
    pub fn new(connect_timeout_ms: u64, read_timeout_ms: u64, write_timeout_ms: u64) -> Self {
        Self {
            connect_timeout: millis(connect_timeout_ms),
            read_timeout: millis(read_timeout_ms),
            write_timeout: millis(write_timeout_ms),
        }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(
            config.connect_timeout_ms,
            config.read_timeout_ms,
            config.write_timeout_ms,
        )
    }

    /// Push the file at `source` to `node` as `part_name`
    pub fn store(&self, node: &StorageServerInfo, part_name: &str, source: &Path) -> Result<u64> {
        let mut file = File::open(source)?;
        let length = file.metadata()?.len();

        let (mut reader, mut writer) = self.connect(node)?;
        write_node_request(
            &mut writer,
            &NodeRequest::Store {
                part_name: part_name.to_string(),
                length,
            },
        )?;
        copy_exact(&mut file, &mut writer, length)?;
        writer.flush()?;

        let reply = read_string(&mut reader)?;
        if reply != PART_STORED {
            return Err(AtlasError::Remote(reply));
        }

        tracing::debug!("Part {} ({} bytes) stored on {}", part_name, length, node);
        Ok(length)
    }

    /// Pull `part_name` from `node` into `dest`
    ///
    /// On `NotFound` nothing is written. A body shorter than announced is an
    /// error and leaves no file at `dest`.
    pub fn fetch(&self, node: &StorageServerInfo, part_name: &str, dest: &Path) -> Result<FetchOutcome> {
        let (mut reader, mut writer) = self.connect(node)?;
        write_node_request(
            &mut writer,
            &NodeRequest::GetPart {
                part_name: part_name.to_string(),
            },
        )?;

        let length = match read_part_reply(&mut reader)? {
            PartReply::Found { length } => length,
            PartReply::NotFound => return Ok(FetchOutcome::NotFound),
        };

        let result = Self::receive_part(&mut reader, dest, length);
        if result.is_err() {
            let _ = fs::remove_file(dest);
        }
        result?;

        tracing::debug!("Part {} ({} bytes) fetched from {}", part_name, length, node);
        Ok(FetchOutcome::Found { length })
    }

    /// Ask `node` to delete `part_name`
    ///
    /// `Ok(false)` when the node answers FAILURE (absent or I/O error there).
    pub fn delete(&self, node: &StorageServerInfo, part_name: &str) -> Result<bool> {
        let (mut reader, mut writer) = self.connect(node)?;
        write_node_request(
            &mut writer,
            &NodeRequest::DeletePart {
                part_name: part_name.to_string(),
            },
        )?;

        let reply = read_string(&mut reader)?;
        match reply.as_str() {
            SUCCESS => Ok(true),
            FAILURE => Ok(false),
            _ => Err(AtlasError::Remote(reply)),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn receive_part(reader: &mut BufReader<TcpStream>, dest: &Path, length: u64) -> Result<()> {
        let mut out = BufWriter::new(File::create(dest)?);
        copy_exact(reader, &mut out, length)?;
        out.flush()?;
        Ok(())
    }

    fn connect(&self, node: &StorageServerInfo) -> Result<(BufReader<TcpStream>, BufWriter<TcpStream>)> {
        let addrs: Vec<SocketAddr> = (node.host.as_str(), node.port)
            .to_socket_addrs()
            .map_err(|e| AtlasError::Network(format!("cannot resolve {}: {}", node, e)))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(self.read_timeout)?;
                    stream.set_write_timeout(self.write_timeout)?;
                    let read_stream = stream.try_clone()?;
                    return Ok((BufReader::new(read_stream), BufWriter::new(stream)));
                }
                Err(e) => last_error = Some(e),
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no address resolved".to_string());
        Err(AtlasError::Network(format!("cannot connect to {}: {}", node, reason)))
    }
}
