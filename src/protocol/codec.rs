//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### String
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │       UTF-8 bytes           │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Length
//! ```text
//! ┌──────────────────────┐
//! │   u64 big-endian (8) │
//! └──────────────────────┘
//! ```
//!
//! ### Request layouts
//! - list:        "list"
//! - upload:      "upload" + name + length + raw bytes
//! - download:    "download" + name
//! - DELETE_FILE: "DELETE_FILE" + name
//! - store:       "store" + part name + length + raw bytes
//! - GET_PART:    "GET_PART" + part name
//! - DELETE_PART: "DELETE_PART" + part name

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::command::{
    CMD_DELETE_FILE, CMD_DELETE_PART, CMD_DOWNLOAD, CMD_GET_PART, CMD_LIST, CMD_STORE,
    CMD_UPLOAD,
};
use super::response::{PART_FOUND, PART_NOT_FOUND};
use super::{ClientRequest, NodeRequest, PartReply};
use crate::error::{AtlasError, Result};

/// Size of a string length prefix
pub const STRING_HEADER_SIZE: usize = 4;

/// Size of an encoded file length
pub const LENGTH_SIZE: usize = 8;

/// Maximum encoded string size (64 KB)
pub const MAX_STRING_LEN: u32 = 64 * 1024;

// =============================================================================
// Primitive Encoding/Decoding
// =============================================================================

/// Append a length-prefixed string to `buf`
pub fn put_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    if value.len() > MAX_STRING_LEN as usize {
        return Err(AtlasError::Protocol(format!(
            "String too large: {} bytes (max {})",
            value.len(),
            MAX_STRING_LEN
        )));
    }

    buf.reserve(STRING_HEADER_SIZE + value.len());
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Read a length-prefixed string from a stream
pub fn read_string<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let mut header = [0u8; STRING_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = u32::from_be_bytes(header);
    if len > MAX_STRING_LEN {
        return Err(AtlasError::Protocol(format!(
            "String too large: {} bytes (max {})",
            len, MAX_STRING_LEN
        )));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;

    String::from_utf8(data)
        .map_err(|e| AtlasError::Protocol(format!("String is not valid UTF-8: {}", e)))
}

/// Write a length-prefixed string (no flush)
pub fn write_string<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    let mut buf = BytesMut::new();
    put_string(&mut buf, value)?;
    writer.write_all(&buf)?;
    Ok(())
}

/// Read an 8-byte big-endian length
pub fn read_length<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; LENGTH_SIZE];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Write an 8-byte big-endian length (no flush)
pub fn write_length<W: Write + ?Sized>(writer: &mut W, length: u64) -> Result<()> {
    writer.write_all(&length.to_be_bytes())?;
    Ok(())
}

/// Write a reply string and flush
pub fn write_reply<W: Write + ?Sized>(writer: &mut W, reply: &str) -> Result<()> {
    write_string(writer, reply)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Payload Streaming
// =============================================================================

/// Copy exactly `length` bytes from `reader` to `writer`
///
/// Never reads past `length`, so the next message on a shared stream is left
/// untouched. Fails with `UnexpectedEof` if the stream ends early.
pub fn copy_exact<R, W>(reader: &mut R, writer: &mut W, length: u64) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let copied = io::copy(&mut reader.take(length), writer)?;
    if copied < length {
        return Err(AtlasError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended after {} of {} bytes", copied, length),
        )));
    }
    Ok(copied)
}

/// Consume and discard exactly `length` bytes
pub fn drain<R: Read + ?Sized>(reader: &mut R, length: u64) -> Result<u64> {
    copy_exact(reader, &mut io::sink(), length)
}

// =============================================================================
// Client Request Encoding/Decoding
// =============================================================================

/// Encode a client request header
///
/// For uploads the raw bytes are not included; callers stream them after
/// the header.
pub fn encode_client_request(request: &ClientRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_string(&mut buf, request.keyword())?;

    match request {
        ClientRequest::List => {}
        ClientRequest::Upload { file_name, length } => {
            put_string(&mut buf, file_name)?;
            buf.put_u64(*length);
        }
        ClientRequest::Download { file_name } | ClientRequest::DeleteFile { file_name } => {
            put_string(&mut buf, file_name)?;
        }
    }

    Ok(buf.freeze())
}

/// Read a client request header from a stream
///
/// Blocks until a complete header is received or an error occurs. An
/// unrecognised keyword yields `AtlasError::UnknownCommand`.
pub fn read_client_request<R: Read + ?Sized>(reader: &mut R) -> Result<ClientRequest> {
    let keyword = read_string(reader)?;

    match keyword.as_str() {
        CMD_LIST => Ok(ClientRequest::List),
        CMD_UPLOAD => {
            let file_name = read_string(reader)?;
            let length = read_length(reader)?;
            Ok(ClientRequest::Upload { file_name, length })
        }
        CMD_DOWNLOAD => Ok(ClientRequest::Download {
            file_name: read_string(reader)?,
        }),
        CMD_DELETE_FILE => Ok(ClientRequest::DeleteFile {
            file_name: read_string(reader)?,
        }),
        _ => Err(AtlasError::UnknownCommand(keyword)),
    }
}

/// Write a client request header and flush
pub fn write_client_request<W: Write + ?Sized>(writer: &mut W, request: &ClientRequest) -> Result<()> {
    let bytes = encode_client_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Node Request Encoding/Decoding
// =============================================================================

/// Encode a storage node request header
pub fn encode_node_request(request: &NodeRequest) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    put_string(&mut buf, request.keyword())?;
    put_string(&mut buf, request.part_name())?;

    if let NodeRequest::Store { length, .. } = request {
        buf.put_u64(*length);
    }

    Ok(buf.freeze())
}

/// Read a storage node request header from a stream
pub fn read_node_request<R: Read + ?Sized>(reader: &mut R) -> Result<NodeRequest> {
    let keyword = read_string(reader)?;

    match keyword.as_str() {
        CMD_STORE => {
            let part_name = read_string(reader)?;
            let length = read_length(reader)?;
            Ok(NodeRequest::Store { part_name, length })
        }
        CMD_GET_PART => Ok(NodeRequest::GetPart {
            part_name: read_string(reader)?,
        }),
        CMD_DELETE_PART => Ok(NodeRequest::DeletePart {
            part_name: read_string(reader)?,
        }),
        _ => Err(AtlasError::UnknownCommand(keyword)),
    }
}

/// Write a storage node request header and flush
pub fn write_node_request<W: Write + ?Sized>(writer: &mut W, request: &NodeRequest) -> Result<()> {
    let bytes = encode_node_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read the status (and length, if found) of a fetch reply
///
/// Any status other than found / not found is returned as `Remote`.
pub fn read_part_reply<R: Read + ?Sized>(reader: &mut R) -> Result<PartReply> {
    let status = read_string(reader)?;

    match status.as_str() {
        PART_FOUND => Ok(PartReply::Found {
            length: read_length(reader)?,
        }),
        PART_NOT_FOUND => Ok(PartReply::NotFound),
        _ => Err(AtlasError::Remote(status)),
    }
}
