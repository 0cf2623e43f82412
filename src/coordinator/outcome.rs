//! Operation outcomes
//!
//! Results of coordinator operations that are not plain success/error.

use std::fmt;
use std::fs::File;
use std::path::PathBuf;

use crate::protocol::{UPLOAD_COMPLETE, UPLOAD_FAILED, UPLOAD_PARTIAL};

/// Why a part did not end up on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// More parts than configured storage nodes
    NoStorageNode,

    /// The transfer to the node failed
    TransferFailed(String),

    /// The part reached the node but the ledger append failed
    NotRecorded(String),
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::NoStorageNode => write!(f, "no storage node"),
            MissingReason::TransferFailed(e) => write!(f, "transfer failed: {}", e),
            MissingReason::NotRecorded(e) => write!(f, "not recorded: {}", e),
        }
    }
}

/// A part that was not placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPart {
    pub part_name: String,
    pub reason: MissingReason,
}

impl fmt::Display for MissingPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.part_name, self.reason)
    }
}

/// Result of distributing an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionOutcome {
    /// Every part placed and recorded
    Complete { parts: usize },

    /// Some parts placed, others missing. Placed parts are not rolled back.
    PartialFailure {
        placed: usize,
        missing: Vec<MissingPart>,
    },

    /// Nothing placed
    TotalFailure { cause: String },
}

impl DistributionOutcome {
    /// Classify the result of a placement run
    pub fn from_placement(placed: usize, missing: Vec<MissingPart>) -> Self {
        if missing.is_empty() {
            DistributionOutcome::Complete { parts: placed }
        } else if placed == 0 {
            let cause = missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            DistributionOutcome::TotalFailure { cause }
        } else {
            DistributionOutcome::PartialFailure { placed, missing }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DistributionOutcome::Complete { .. })
    }
}

/// Rendered as the upload reply sent to clients
impl fmt::Display for DistributionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionOutcome::Complete { parts } => {
                write!(f, "{}: {} parts stored", UPLOAD_COMPLETE, parts)
            }
            DistributionOutcome::PartialFailure { placed, missing } => {
                let missing_list = missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "{}: {} of {} parts stored, missing {}",
                    UPLOAD_PARTIAL,
                    placed,
                    placed + missing.len(),
                    missing_list
                )
            }
            DistributionOutcome::TotalFailure { cause } => {
                write!(f, "{}: {}", UPLOAD_FAILED, cause)
            }
        }
    }
}

/// Result of deleting a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Ledger records struck; `node_failures` lists parts the nodes did not
    /// confirm deleting (they may be orphaned)
    Deleted {
        parts: usize,
        node_failures: Vec<String>,
    },

    /// No record matched
    NotFound,
}

/// An assembled file ready to be streamed to a client
#[derive(Debug)]
pub struct RetrievedFile {
    /// Logical file name
    pub name: String,

    /// Location in the coordinator's download directory
    pub path: PathBuf,

    /// Open handle; the length below was measured on it
    pub file: File,

    /// Byte length
    pub length: u64,
}
