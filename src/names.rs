//! File and part naming rules
//!
//! Logical file names double as ledger fields and as the prefix of part
//! file names on storage nodes, so they must be safe for both: no path
//! separators or traversal, and nothing that breaks a CSV line.

use crate::error::{AtlasError, Result};

/// Maximum length of a file or part name in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Separator between a file name and the part ordinal
const PART_SUFFIX: &str = ".part";

/// Validate a logical file name or a part name
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AtlasError::InvalidName(name.to_string()));
    }

    if name == "." || name == ".." {
        return Err(AtlasError::InvalidName(name.to_string()));
    }

    let forbidden = |c: char| matches!(c, '/' | '\\' | ',' | '\0' | '\n' | '\r');
    if name.contains(forbidden) {
        return Err(AtlasError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Validate the name of a file about to be split into `part_count` parts
///
/// The name itself must pass [`validate_name`], and the longest part name
/// derived from it must still fit in [`MAX_NAME_LEN`].
pub fn validate_file_name(name: &str, part_count: usize) -> Result<()> {
    validate_name(name)?;

    let longest_part = name.len() + PART_SUFFIX.len() + part_count.max(1).to_string().len();
    if longest_part > MAX_NAME_LEN {
        return Err(AtlasError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Name of part `index` (0-based) of `file_name`
///
/// "hello.txt", 0 → "hello.txt.part1"
pub fn part_name(file_name: &str, index: usize) -> String {
    format!("{}{}{}", file_name, PART_SUFFIX, index + 1)
}

/// Recover the 0-based index of a part from its name
///
/// "hello.txt.part2" → Some(1). Returns None when the part does not belong
/// to `file_name` or the suffix is not a positive number.
pub fn part_index(file_name: &str, part_name: &str) -> Option<usize> {
    let suffix = part_name
        .strip_prefix(file_name)?
        .strip_prefix(PART_SUFFIX)?;

    // Reject "+1", "01" and friends so the mapping stays one-to-one
    if suffix.is_empty() || suffix.starts_with('0') || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let ordinal: usize = suffix.parse().ok()?;
    ordinal.checked_sub(1)
}
