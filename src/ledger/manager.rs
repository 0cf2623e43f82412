//! Ledger Manager
//!
//! Owns the ledger file and its in-memory index.
//!
//! ## Responsibilities
//! - Rebuild the index from the ledger file on startup
//! - Append one line per placed part
//! - Strike all lines of a file with an atomic rewrite (temp file + rename)
//! - Serve lookups from memory

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::{AtlasError, Result};

use super::MappingRecord;

/// Counters gathered while loading the ledger file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Records kept in the index
    pub records: usize,

    /// Lines that could not be parsed (kept on disk, ignored in memory)
    pub malformed: usize,

    /// Lines collapsed because an identical (file, part) appeared later
    pub duplicates: usize,
}

/// The metadata ledger
///
/// ## Concurrency:
/// - `write_lock`: serializes every mutation of the ledger file (single writer)
/// - `index`: RwLock, readers never wait on file I/O, only on the short
///   index update at the end of a mutation
/// - The ledger file is only ever appended to or replaced by rename, so an
///   external reader never sees a half-written file
pub struct Ledger {
    /// Path of the ledger file
    path: PathBuf,

    /// File name → records ordered by part index
    index: RwLock<BTreeMap<String, Vec<MappingRecord>>>,

    /// Serializes writers
    write_lock: Mutex<()>,

    /// What the last load found
    load_stats: LoadStats,
}

impl Ledger {
    /// Open or create the ledger at `path` and rebuild the index
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Make sure the file exists so readers and rewrites have something to open
        OpenOptions::new().create(true).append(true).open(path)?;

        let (index, load_stats) = Self::load(path)?;

        if load_stats.malformed > 0 || load_stats.duplicates > 0 {
            tracing::warn!(
                "Ledger {}: {} malformed lines skipped, {} duplicate lines collapsed",
                path.display(),
                load_stats.malformed,
                load_stats.duplicates
            );
        }
        tracing::debug!(
            "Ledger {} loaded: {} files, {} records",
            path.display(),
            index.len(),
            load_stats.records
        );

        // Stale temp file from a rewrite that never reached the rename
        let _ = fs::remove_file(Self::tmp_path_for(path));

        Ok(Self {
            path: path.to_path_buf(),
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
            load_stats,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All records of `file_name`, ordered by part index
    pub fn records_for(&self, file_name: &str) -> Vec<MappingRecord> {
        self.index.read().get(file_name).cloned().unwrap_or_default()
    }

    /// Unique file names, sorted
    pub fn file_names(&self) -> Vec<String> {
        self.index.read().keys().cloned().collect()
    }

    /// Whether any record references `file_name`
    pub fn contains(&self, file_name: &str) -> bool {
        self.index.read().contains_key(file_name)
    }

    /// Total number of records in the index
    pub fn record_count(&self) -> usize {
        self.index.read().values().map(Vec::len).sum()
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counters from the startup load
    pub fn load_stats(&self) -> LoadStats {
        self.load_stats
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append one record
    ///
    /// If the same (file, part) is already recorded, the old line is replaced
    /// through the atomic rewrite path instead, so the ledger never holds two
    /// lines for one part.
    pub fn append(&self, record: MappingRecord) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let line = record.to_line();
        let duplicate = self
            .index
            .read()
            .get(&record.file_name)
            .map_or(false, |parts| parts.iter().any(|r| r.part_name == record.part_name));

        if duplicate {
            let (file_name, part_name) = (record.file_name.as_str(), record.part_name.as_str());
            self.rewrite(|l| line_fields(l) != (file_name, part_name), &[line.clone()])?;
        } else {
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&self.path)?;

            // A torn last line (crash mid-append, hand edit) must not swallow this record
            let mut entry = String::with_capacity(line.len() + 2);
            if !ends_with_newline(&mut file)? {
                entry.push('\n');
            }
            entry.push_str(&line);
            entry.push('\n');

            file.write_all(entry.as_bytes())?;
            file.sync_data()?;
        }

        tracing::trace!("Ledger append: {}", line);

        let mut index = self.index.write();
        let parts = index.entry(record.file_name.clone()).or_default();
        parts.retain(|r| r.part_name != record.part_name);
        parts.push(record);
        sort_parts(parts);

        Ok(())
    }

    /// Replace every record of `file_name` with `records` in one rewrite
    ///
    /// Readers see either the old set or the new one, never a mix and never
    /// neither. Returns the records that were replaced.
    pub fn replace_file(
        &self,
        file_name: &str,
        records: Vec<MappingRecord>,
    ) -> Result<Vec<MappingRecord>> {
        if let Some(stray) = records.iter().find(|r| r.file_name != file_name) {
            return Err(AtlasError::Ledger(format!(
                "record for {} passed when replacing {}",
                stray.file_name, file_name
            )));
        }

        let _write_guard = self.write_lock.lock();

        let mut records = records;
        sort_parts(&mut records);
        records.dedup_by(|a, b| a.part_name == b.part_name);

        let lines: Vec<String> = records.iter().map(MappingRecord::to_line).collect();
        let struck = self.rewrite(|line| MappingRecord::file_name_of(line) != file_name, &lines)?;

        let mut index = self.index.write();
        let replaced = if records.is_empty() {
            index.remove(file_name)
        } else {
            index.insert(file_name.to_string(), records)
        }
        .unwrap_or_default();

        tracing::debug!(
            "Ledger: replaced {} ({} lines struck, {} written)",
            file_name,
            struck,
            lines.len()
        );

        Ok(replaced)
    }

    /// Strike every record of `file_name`
    ///
    /// Returns the records that were removed (empty if the file was unknown).
    pub fn remove_file(&self, file_name: &str) -> Result<Vec<MappingRecord>> {
        let _write_guard = self.write_lock.lock();

        if !self.index.read().contains_key(file_name) {
            return Ok(Vec::new());
        }

        let removed_lines =
            self.rewrite(|line| MappingRecord::file_name_of(line) != file_name, &[])?;

        let removed = self.index.write().remove(file_name).unwrap_or_default();
        tracing::debug!(
            "Ledger: struck {} lines for {} ({} records)",
            removed_lines,
            file_name,
            removed.len()
        );

        Ok(removed)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Rebuild the index from the file
    fn load(path: &Path) -> Result<(BTreeMap<String, Vec<MappingRecord>>, LoadStats)> {
        let contents = fs::read_to_string(path)?;
        let mut index: BTreeMap<String, Vec<MappingRecord>> = BTreeMap::new();
        let mut stats = LoadStats::default();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record = match MappingRecord::parse_line(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Ledger line {} skipped: {}", line_no + 1, e);
                    stats.malformed += 1;
                    continue;
                }
            };

            let parts = index.entry(record.file_name.clone()).or_default();
            match parts.iter_mut().find(|r| r.part_name == record.part_name) {
                // Last line wins
                Some(existing) => {
                    *existing = record;
                    stats.duplicates += 1;
                }
                None => parts.push(record),
            }
        }

        for parts in index.values_mut() {
            sort_parts(parts);
        }
        stats.records = index.values().map(Vec::len).sum();

        Ok((index, stats))
    }

    /// Write the lines accepted by `keep` (plus `extra`) to a temp file, then
    /// rename it over the ledger. Returns how many lines were dropped.
    ///
    /// Caller must hold `write_lock`.
    fn rewrite<F>(&self, keep: F, extra: &[String]) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let contents = fs::read_to_string(&self.path)?;
        let tmp_path = Self::tmp_path_for(&self.path);

        let written = Self::write_kept(&tmp_path, &contents, &keep, extra);
        let dropped = match written {
            Ok(dropped) => dropped,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        fs::rename(&tmp_path, &self.path)?;
        Ok(dropped)
    }

    fn write_kept<F>(tmp_path: &Path, contents: &str, keep: &F, extra: &[String]) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let mut writer = BufWriter::new(File::create(tmp_path)?);
        let mut dropped = 0;

        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if keep(line) {
                writeln!(writer, "{}", line)?;
            } else {
                dropped += 1;
            }
        }
        for line in extra {
            writeln!(writer, "{}", line)?;
        }

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok(dropped)
    }

    /// "file_mapping.txt" → "file_mapping.txt.tmp"
    fn tmp_path_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Order parts by index; unparseable part names sink to the end in load order
fn sort_parts(parts: &mut [MappingRecord]) {
    parts.sort_by_key(|r| r.part_index().unwrap_or(usize::MAX));
}

/// Whether `file` is empty or its last byte is a newline
fn ends_with_newline(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// (file, part) fields of a raw ledger line
fn line_fields(line: &str) -> (&str, &str) {
    let mut fields = line.split(',').map(str::trim);
    let file = fields.next().unwrap_or("");
    let part = fields.next().unwrap_or("");
    (file, part)
}
