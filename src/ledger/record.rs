//! Ledger record definitions
//!
//! One line of the ledger: `fileName,partName,host:port`.

use std::str::FromStr;

use crate::config::StorageServerInfo;
use crate::error::{AtlasError, Result};
use crate::names;

/// Maps one part of a logical file to the node that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRecord {
    /// Logical file the part belongs to
    pub file_name: String,

    /// Part name, `<file_name>.part<N>`
    pub part_name: String,

    /// Storage node holding the part bytes
    pub node: StorageServerInfo,
}

impl MappingRecord {
    pub fn new(
        file_name: impl Into<String>,
        part_name: impl Into<String>,
        node: StorageServerInfo,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            part_name: part_name.into(),
            node,
        }
    }

    /// 0-based position of this part within its file, if the name is well formed
    pub fn part_index(&self) -> Option<usize> {
        names::part_index(&self.file_name, &self.part_name)
    }

    /// Serialize to a ledger line (without trailing newline)
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.file_name, self.part_name, self.node)
    }

    /// Parse a ledger line
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(|c| c == '\r' || c == '\n').split(',').collect();

        if fields.len() != 3 {
            return Err(AtlasError::Ledger(format!(
                "expected 3 fields, got {} in {:?}",
                fields.len(),
                line
            )));
        }

        let file_name = fields[0].trim();
        let part_name = fields[1].trim();
        if file_name.is_empty() || part_name.is_empty() {
            return Err(AtlasError::Ledger(format!("empty field in {:?}", line)));
        }

        let node = StorageServerInfo::from_str(fields[2])
            .map_err(|e| AtlasError::Ledger(format!("bad node address in {:?}: {}", line, e)))?;

        Ok(Self::new(file_name, part_name, node))
    }

    /// File name of a raw ledger line, without parsing the rest
    pub(crate) fn file_name_of(line: &str) -> &str {
        line.split(',').next().unwrap_or("").trim()
    }
}
