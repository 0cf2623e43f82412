//! Response definitions
//!
//! Every reply starts with a status string. Replies that carry a body
//! (a downloaded file, a fetched part) follow the string with an 8-byte
//! length and the raw bytes.

// -----------------------------------------------------------------------------
// Coordinator → client
// -----------------------------------------------------------------------------

/// Prefix of the `list` reply, followed by ", "-joined names
pub const LIST_PREFIX: &str = "Fichiers disponibles : ";

/// Prefix of a successful `download` reply, followed by the file name
pub const DOWNLOAD_PREFIX: &str = "Downloading:";

/// Upload outcomes
pub const UPLOAD_COMPLETE: &str = "UPLOAD_COMPLETE";
pub const UPLOAD_PARTIAL: &str = "UPLOAD_PARTIAL";
pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";

/// Prefix of any error reply
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Prefix of the `DELETE_FILE` reply when nothing matched
pub const FILE_NOT_FOUND_PREFIX: &str = "File not found: ";

// -----------------------------------------------------------------------------
// Storage node → coordinator
// -----------------------------------------------------------------------------

pub const PART_STORED: &str = "PART_STORED";
pub const STORE_FAILED_PREFIX: &str = "STORE_FAILED: ";
pub const PART_FOUND: &str = "PART_FOUND";
pub const PART_NOT_FOUND: &str = "PART_NOT_FOUND";

// -----------------------------------------------------------------------------
// Shared
// -----------------------------------------------------------------------------

pub const SUCCESS: &str = "SUCCESS";
pub const FAILURE: &str = "FAILURE";

/// Prefix of the reply to an unrecognised keyword
pub const UNKNOWN_COMMAND_PREFIX: &str = "Unknown command: ";

/// Build the `list` reply
pub fn list_reply<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}{}", LIST_PREFIX, joined)
}

/// Parse a `list` reply back into names
///
/// Returns None if the reply is not a listing (an error string).
pub fn parse_list_reply(reply: &str) -> Option<Vec<String>> {
    let rest = reply.strip_prefix(LIST_PREFIX)?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split(", ").map(str::to_string).collect())
}

/// Build an error reply
pub fn error_reply(message: impl std::fmt::Display) -> String {
    format!("{}{}", ERROR_PREFIX, message)
}

/// Reply to a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartReply {
    /// `PART_FOUND`; `length` raw bytes follow
    Found { length: u64 },

    /// `PART_NOT_FOUND`; nothing follows
    NotFound,
}
