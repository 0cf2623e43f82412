//! Connection Handler
//!
//! Handles individual client connections to the coordinator.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::{Coordinator, RemovalOutcome};
use crate::error::{AtlasError, Result};
use crate::protocol::{
    copy_exact, error_reply, list_reply, read_client_request, write_length, write_reply,
    write_string, ClientRequest, DOWNLOAD_PREFIX, FILE_NOT_FOUND_PREFIX, SUCCESS,
    UNKNOWN_COMMAND_PREFIX, UPLOAD_FAILED,
};

use super::Service;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the coordinator
    coordinator: Arc<Coordinator>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O; timeouts are applied by [`Connection::set_timeouts`]
    pub fn new(stream: TcpStream, coordinator: Arc<Coordinator>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            coordinator,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction without timeout)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop; each one is fully served before the next
    /// is read.
    pub fn handle(&mut self) -> Result<()> {
        loop {
            let request = match read_client_request(&mut self.reader) {
                Ok(request) => request,
                Err(AtlasError::UnknownCommand(keyword)) => {
                    tracing::warn!("Unknown command {:?} from {}", keyword, self.peer_addr);
                    self.send_reply(&format!("{}{}", UNKNOWN_COMMAND_PREFIX, keyword))?;
                    continue;
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e) if e.is_timeout() => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_reply(&error_reply(&e));
                    return Err(e);
                }
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            if let Err(e) = self.execute(request) {
                if e.is_disconnect() {
                    tracing::debug!(
                        "Client {} disconnected before the reply was complete: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                tracing::warn!("Error serving {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Serve one request; an `Err` means the stream can no longer be trusted
    fn execute(&mut self, request: ClientRequest) -> Result<()> {
        match request {
            ClientRequest::List => {
                let names = self.coordinator.list_files();
                self.send_reply(&list_reply(&names))
            }

            ClientRequest::Upload { file_name, length } => {
                match self
                    .coordinator
                    .distribute(&file_name, length, &mut self.reader)
                {
                    Ok(outcome) => self.send_reply(&outcome.to_string()),
                    // The upload body could not be read; the stream is out of sync
                    Err(e @ AtlasError::Io(_)) => Err(e),
                    Err(e) => self.send_reply(&format!("{}: {}", UPLOAD_FAILED, e)),
                }
            }

            ClientRequest::Download { file_name } => match self.coordinator.retrieve(&file_name) {
                Ok(mut retrieved) => {
                    write_string(
                        &mut self.writer,
                        &format!("{}{}", DOWNLOAD_PREFIX, retrieved.name),
                    )?;
                    write_length(&mut self.writer, retrieved.length)?;
                    copy_exact(&mut retrieved.file, &mut self.writer, retrieved.length)?;
                    self.send_flush()?;
                    tracing::info!(
                        "Sent {} ({} bytes) to {}",
                        retrieved.name,
                        retrieved.length,
                        self.peer_addr
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Download of {} failed: {}", file_name, e);
                    self.send_reply(&error_reply(&e))
                }
            },

            ClientRequest::DeleteFile { file_name } => {
                match self.coordinator.remove_file(&file_name) {
                    Ok(RemovalOutcome::Deleted { .. }) => self.send_reply(SUCCESS),
                    Ok(RemovalOutcome::NotFound) => {
                        self.send_reply(&format!("{}{}", FILE_NOT_FOUND_PREFIX, file_name))
                    }
                    Err(e) => self.send_reply(&error_reply(&e)),
                }
            }
        }
    }

    /// Send a reply string to the client
    fn send_reply(&mut self, reply: &str) -> Result<()> {
        write_reply(&mut self.writer, reply)
    }

    fn send_flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Coordinator side of [`Service`]: one [`Connection`] per client
pub struct CoordinatorService {
    coordinator: Arc<Coordinator>,
}

impl CoordinatorService {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }
}

impl Service for CoordinatorService {
    fn name(&self) -> &'static str {
        "coordinator"
    }

    fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut connection = Connection::new(stream, Arc::clone(&self.coordinator))?;
        let timeout = self.coordinator.config().client_timeout_ms;
        connection.set_timeouts(timeout, timeout)?;
        connection.handle()
    }
}
