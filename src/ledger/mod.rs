//! Ledger Module
//!
//! Metadata mapping logical files to their parts and owning nodes.
//!
//! ## File Format
//! Plain text, one record per line, append-ordered:
//! ```text
//! hello.txt,hello.txt.part1,10.0.0.1:5002
//! hello.txt,hello.txt.part2,10.0.0.2:5002
//! ```
//!
//! ## Update Pattern
//! - Append: open for append, write one line, sync
//! - Delete: copy the kept lines to `<ledger>.tmp`, sync, rename over the ledger

mod record;
mod manager;

pub use record::MappingRecord;
pub use manager::{Ledger, LoadStats};

/// File name of the ledger inside the coordinator data directory
pub const LEDGER_FILENAME: &str = "file_mapping.txt";
