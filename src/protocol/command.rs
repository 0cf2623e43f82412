//! Command definitions
//!
//! Requests sent by clients to the coordinator and by the coordinator to
//! storage nodes. Requests that carry a payload only describe its length;
//! the raw bytes follow the header on the same stream.

/// Client → coordinator keywords
pub const CMD_LIST: &str = "list";
pub const CMD_UPLOAD: &str = "upload";
pub const CMD_DOWNLOAD: &str = "download";
pub const CMD_DELETE_FILE: &str = "DELETE_FILE";

/// Coordinator → storage node keywords
pub const CMD_STORE: &str = "store";
pub const CMD_GET_PART: &str = "GET_PART";
pub const CMD_DELETE_PART: &str = "DELETE_PART";

/// A request from a client to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// List the logical files known to the coordinator
    List,

    /// Upload a file; `length` raw bytes follow
    Upload { file_name: String, length: u64 },

    /// Download a whole file
    Download { file_name: String },

    /// Delete a file and all its parts
    DeleteFile { file_name: String },
}

impl ClientRequest {
    /// The wire keyword for this request
    pub fn keyword(&self) -> &'static str {
        match self {
            ClientRequest::List => CMD_LIST,
            ClientRequest::Upload { .. } => CMD_UPLOAD,
            ClientRequest::Download { .. } => CMD_DOWNLOAD,
            ClientRequest::DeleteFile { .. } => CMD_DELETE_FILE,
        }
    }
}

/// A request from the coordinator to a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRequest {
    /// Store a part; `length` raw bytes follow
    Store { part_name: String, length: u64 },

    /// Fetch a part
    GetPart { part_name: String },

    /// Delete a part
    DeletePart { part_name: String },
}

impl NodeRequest {
    /// The wire keyword for this request
    pub fn keyword(&self) -> &'static str {
        match self {
            NodeRequest::Store { .. } => CMD_STORE,
            NodeRequest::GetPart { .. } => CMD_GET_PART,
            NodeRequest::DeletePart { .. } => CMD_DELETE_PART,
        }
    }

    /// The part this request targets
    pub fn part_name(&self) -> &str {
        match self {
            NodeRequest::Store { part_name, .. }
            | NodeRequest::GetPart { part_name }
            | NodeRequest::DeletePart { part_name } => part_name,
        }
    }
}
