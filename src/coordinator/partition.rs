//! Partitioning
//!
//! Splits a staged upload into part files and joins fetched parts back.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::names;
use crate::protocol::copy_exact;

/// One part file materialized in a scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    /// 0-based position within the file
    pub index: usize,

    /// Part name, `<file>.part<index + 1>`
    pub name: String,

    /// Location of the part bytes
    pub path: PathBuf,

    /// Byte length
    pub length: u64,
}

/// Byte length of each part
///
/// Every part but the last gets `floor(total / part_count)` bytes; the last
/// part absorbs the remainder. Lengths always sum to `total_length`.
pub fn part_sizes(total_length: u64, part_count: usize) -> Vec<u64> {
    if part_count == 0 {
        return Vec::new();
    }

    let base = total_length / part_count as u64;
    let mut sizes = vec![base; part_count];
    let last = part_count - 1;
    sizes[last] = total_length - base * last as u64;
    sizes
}

/// Split `source` into `part_count` part files under `dest_dir`
pub fn split_file(
    source: &Path,
    file_name: &str,
    part_count: usize,
    dest_dir: &Path,
) -> Result<Vec<PartFile>> {
    let file = File::open(source)?;
    let total_length = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut parts = Vec::with_capacity(part_count);
    for (index, length) in part_sizes(total_length, part_count).into_iter().enumerate() {
        let name = names::part_name(file_name, index);
        let path = dest_dir.join(&name);

        let mut writer = BufWriter::new(File::create(&path)?);
        copy_exact(&mut reader, &mut writer, length)?;
        writer.flush()?;

        parts.push(PartFile {
            index,
            name,
            path,
            length,
        });
    }

    Ok(parts)
}

/// Concatenate `parts` in order into `dest`, returning the total length
pub fn concatenate(parts: &[PathBuf], dest: &Path) -> Result<u64> {
    let mut writer = BufWriter::new(File::create(dest)?);
    let mut total = 0;

    for part in parts {
        let mut reader = File::open(part)?;
        total += io::copy(&mut reader, &mut writer)?;
    }

    writer.flush()?;
    Ok(total)
}
