//! Protocol Module
//!
//! Defines the wire protocol shared by clients, the coordinator and the
//! storage nodes.
//!
//! ## Protocol Format
//!
//! Every request starts with a keyword string; metadata fields are strings,
//! file sizes are 8-byte big-endian integers, payloads are raw bytes of the
//! announced size.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────┬──────────────────┐
//! │ Len (4)  │  Keyword     │ Len (4)  │  Name    │ [Size (8) + Raw] │
//! └──────────┴──────────────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! ### Client → Coordinator
//! - list, upload, download, DELETE_FILE
//!
//! ### Coordinator → Storage Node
//! - store, GET_PART, DELETE_PART
//!
//! ### Replies
//! A status string, optionally followed by a size and raw bytes
//! (`Downloading:<name>`, `PART_FOUND`).

mod command;
mod response;
mod codec;

pub use command::{
    ClientRequest, NodeRequest, CMD_DELETE_FILE, CMD_DELETE_PART, CMD_DOWNLOAD, CMD_GET_PART,
    CMD_LIST, CMD_STORE, CMD_UPLOAD,
};
pub use response::{
    error_reply, list_reply, parse_list_reply, PartReply, DOWNLOAD_PREFIX, ERROR_PREFIX,
    FAILURE, FILE_NOT_FOUND_PREFIX, LIST_PREFIX, PART_FOUND, PART_NOT_FOUND, PART_STORED,
    STORE_FAILED_PREFIX, SUCCESS, UNKNOWN_COMMAND_PREFIX, UPLOAD_COMPLETE, UPLOAD_FAILED,
    UPLOAD_PARTIAL,
};
pub use codec::{
    copy_exact, drain, encode_client_request, encode_node_request, put_string,
    read_client_request, read_length, read_node_request, read_part_reply, read_string,
    write_client_request, write_length, write_node_request, write_reply, write_string,
    LENGTH_SIZE, MAX_STRING_LEN, STRING_HEADER_SIZE,
};
