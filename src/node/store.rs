//! Part Store
//!
//! Local directory of part files, named exactly as received.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::names;
use crate::protocol::copy_exact;

/// Part files kept under one storage root
pub struct PartStore {
    root: PathBuf,
}

impl PartStore {
    /// Open or create the storage root
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Store exactly `length` bytes from `reader` under `part_name`
    ///
    /// Overwrites an existing part. If the stream ends early or the write
    /// fails, no partial file is left behind.
    pub fn store<R: Read + ?Sized>(&self, part_name: &str, length: u64, reader: &mut R) -> Result<u64> {
        let path = self.part_path(part_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let result = Self::write_part(&path, length, reader);
        if result.is_err() {
            let _ = fs::remove_file(&path);
        }
        result
    }

    /// Open a part for streaming
    ///
    /// Returns the open file and its length, measured before any byte is
    /// sent, or None if the part does not exist.
    pub fn open_part(&self, part_name: &str) -> Result<Option<(File, u64)>> {
        let path = self.part_path(part_name)?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some((file, metadata.len())))
    }

    /// Delete a part
    ///
    /// `Ok(false)` if it was not there.
    pub fn delete(&self, part_name: &str) -> Result<bool> {
        let path = self.part_path(part_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a part with this name is stored
    pub fn contains(&self, part_name: &str) -> bool {
        self.part_path(part_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Names of all stored parts, sorted
    pub fn list_parts(&self) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                parts.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        parts.sort();
        Ok(parts)
    }

    /// Get the storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn part_path(&self, part_name: &str) -> Result<PathBuf> {
        names::validate_name(part_name)?;
        Ok(self.root.join(part_name))
    }

    fn write_part<R: Read + ?Sized>(path: &Path, length: u64, reader: &mut R) -> Result<u64> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = copy_exact(reader, &mut writer, length)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(written)
    }
}
