//! Coordinator Module
//!
//! The coordinator accepts whole files from clients, splits each into
//! `part_count` parts and spreads them over the storage nodes, recording the
//! placement in the ledger. Downloads fetch the parts back and concatenate
//! them; deletes remove the parts from their nodes and strike the records.
//!
//! ## Part Layout
//! For a file of `L` bytes split into `K` parts:
//! - parts `1..K-1` hold `floor(L / K)` bytes each
//! - part `K` holds the remainder
//! - part `i` (0-based) goes to storage node `i`; without such a node the
//!   part is reported missing

mod engine;
mod outcome;
mod partition;
mod scratch;

pub use engine::Coordinator;
pub use outcome::{
    DistributionOutcome, MissingPart, MissingReason, RemovalOutcome, RetrievedFile,
};
pub use partition::{concatenate, part_sizes, split_file, PartFile};
pub use scratch::ScratchDir;
