//! Coordinator Client
//!
//! Blocking client for the coordinator protocol, used by the `atlasfs` CLI
//! and the integration tests. One client holds one connection and may send
//! any number of requests over it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use crate::error::{AtlasError, Result};
use crate::protocol::{
    copy_exact, parse_list_reply, read_length, read_string, write_client_request, ClientRequest,
    DOWNLOAD_PREFIX,
};

/// A downloaded file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Name echoed by the coordinator
    pub name: String,

    /// Number of bytes written to the sink
    pub length: u64,
}

/// Blocking coordinator client
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a coordinator at `addr` (`host:port`)
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| AtlasError::Network(format!("cannot connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Set a read timeout on replies (`None` waits forever)
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Names of the stored files
    pub fn list(&mut self) -> Result<Vec<String>> {
        write_client_request(&mut self.writer, &ClientRequest::List)?;
        let reply = read_string(&mut self.reader)?;

        parse_list_reply(&reply).ok_or(AtlasError::Remote(reply))
    }

    /// Upload exactly `length` bytes from `reader` as `file_name`
    ///
    /// Returns the coordinator's reply (`UPLOAD_COMPLETE: ...`,
    /// `UPLOAD_PARTIAL: ...` or `UPLOAD_FAILED: ...`).
    pub fn upload<R: Read + ?Sized>(
        &mut self,
        file_name: &str,
        length: u64,
        reader: &mut R,
    ) -> Result<String> {
        let request = ClientRequest::Upload {
            file_name: file_name.to_string(),
            length,
        };
        write_client_request(&mut self.writer, &request)?;
        copy_exact(reader, &mut self.writer, length)?;
        self.writer.flush()?;

        read_string(&mut self.reader)
    }

    pub fn upload_bytes(&mut self, file_name: &str, data: &[u8]) -> Result<String> {
        let mut reader = data;
        self.upload(file_name, data.len() as u64, &mut reader)
    }

    /// Upload a local file under its own file name
    pub fn upload_file(&mut self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AtlasError::InvalidName(path.display().to_string()))?
            .to_string();

        let mut file = File::open(path)?;
        let length = file.metadata()?.len();
        self.upload(&file_name, length, &mut file)
    }

    /// Download `file_name` into `sink`
    ///
    /// Any reply other than `Downloading:<name>` is returned as
    /// `AtlasError::Remote` and nothing is written.
    pub fn download<W: Write + ?Sized>(&mut self, file_name: &str, sink: &mut W) -> Result<Download> {
        let request = ClientRequest::Download {
            file_name: file_name.to_string(),
        };
        write_client_request(&mut self.writer, &request)?;

        let reply = read_string(&mut self.reader)?;
        let name = match reply.strip_prefix(DOWNLOAD_PREFIX) {
            Some(name) => name.to_string(),
            None => return Err(AtlasError::Remote(reply)),
        };

        let length = read_length(&mut self.reader)?;
        copy_exact(&mut self.reader, sink, length)?;
        sink.flush()?;

        Ok(Download { name, length })
    }

    pub fn download_bytes(&mut self, file_name: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.download(file_name, &mut data)?;
        Ok(data)
    }

    /// Delete `file_name`, returning the reply verbatim
    /// (`SUCCESS`, `File not found: <name>` or `ERROR: ...`)
    pub fn delete(&mut self, file_name: &str) -> Result<String> {
        let request = ClientRequest::DeleteFile {
            file_name: file_name.to_string(),
        };
        write_client_request(&mut self.writer, &request)?;
        read_string(&mut self.reader)
    }

    /// Send a raw keyword with no arguments and return the reply
    pub fn send_raw_command(&mut self, keyword: &str) -> Result<String> {
        crate::protocol::write_string(&mut self.writer, keyword)?;
        self.writer.flush()?;
        read_string(&mut self.reader)
    }
}
