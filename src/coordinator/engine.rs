//! Coordinator Engine
//!
//! Owns the ledger and the storage node client, and implements the three
//! file operations on top of them.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{CoordinatorConfig, StorageServerInfo};
use crate::error::{AtlasError, Result};
use crate::ledger::{Ledger, MappingRecord, LEDGER_FILENAME};
use crate::names;
use crate::node::{FetchOutcome, NodeClient};
use crate::protocol::drain;

use super::outcome::{
    DistributionOutcome, MissingPart, MissingReason, RemovalOutcome, RetrievedFile,
};
use super::partition::{self, PartFile};
use super::scratch::ScratchDir;

/// Receive buffer for upload bodies
const RECEIVE_CHUNK_SIZE: usize = 64 * 1024;

/// The coordinator
///
/// ## Concurrency Model
///
/// Every method takes `&self`; one instance is shared by all connection
/// threads behind an `Arc`.
///
/// - Ledger mutations are serialized inside [`Ledger`] (internal writer
///   mutex, readers never block on file I/O)
/// - Each upload/download stages its files in its own [`ScratchDir`], so
///   operations on different files never touch the same temporary path
/// - Part transfers of one operation run in parallel on scoped threads
pub struct Coordinator {
    /// Coordinator configuration
    config: CoordinatorConfig,

    /// File -> parts -> node mapping
    ledger: Ledger,

    /// Storage node protocol client
    nodes: NodeClient,

    /// Parent of all per-operation scratch directories
    scratch_root: PathBuf,

    /// Assembled files served to clients
    download_dir: PathBuf,
}

impl Coordinator {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SCRATCH_DIR: &'static str = "tmp";
    const DOWNLOAD_DIR: &'static str = "download";
    const UPLOAD_FILENAME: &'static str = "upload.tmp";
    const ASSEMBLED_FILENAME: &'static str = "assembled.tmp";

    /// Open or create a coordinator with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the data, scratch and download directories
    /// 3. Clear scratch directories left by a previous run
    /// 4. Load the ledger
    pub fn open(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let scratch_root = config.data_dir.join(Self::SCRATCH_DIR);
        let download_dir = config.data_dir.join(Self::DOWNLOAD_DIR);

        if scratch_root.exists() {
            tracing::debug!("Clearing stale scratch root {}", scratch_root.display());
            fs::remove_dir_all(&scratch_root)?;
        }
        fs::create_dir_all(&scratch_root)?;
        fs::create_dir_all(&download_dir)?;

        let ledger = Ledger::open(&config.data_dir.join(LEDGER_FILENAME))?;

        if config.storage_nodes.len() < config.part_count {
            tracing::warn!(
                "{} storage nodes configured for {} parts per file; uploads will be partial",
                config.storage_nodes.len(),
                config.part_count
            );
        }

        tracing::info!(
            "Coordinator opened: {} files in ledger, {} storage nodes, {} parts per file",
            ledger.file_names().len(),
            config.storage_nodes.len(),
            config.part_count
        );

        Ok(Self {
            nodes: NodeClient::from_config(&config),
            config,
            ledger,
            scratch_root,
            download_dir,
        })
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Names of all files with at least one recorded part, sorted, unique
    pub fn list_files(&self) -> Vec<String> {
        self.ledger.file_names()
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Receive exactly `total_length` bytes from `reader`, split them into
    /// parts and place part `i` on storage node `i`
    ///
    /// An `Err(AtlasError::Io)` means reading the upload body failed and the
    /// stream is no longer positioned at a request boundary. Every other
    /// error is returned after the body has been consumed in full.
    pub fn distribute<R: Read + ?Sized>(
        &self,
        file_name: &str,
        total_length: u64,
        reader: &mut R,
    ) -> Result<DistributionOutcome> {
        if let Err(e) = names::validate_file_name(file_name, self.config.part_count) {
            drain(reader, total_length)?;
            return Err(e);
        }

        let scratch = match ScratchDir::create(&self.scratch_root) {
            Ok(scratch) => scratch,
            Err(e) => {
                drain(reader, total_length)?;
                return Err(AtlasError::Storage(format!(
                    "cannot create scratch directory: {}",
                    e
                )));
            }
        };

        let upload_path = scratch.path().join(Self::UPLOAD_FILENAME);
        receive_upload(reader, &upload_path, total_length)?;

        tracing::debug!("Received {} ({} bytes)", file_name, total_length);

        let outcome = match self.stage_and_place(file_name, &upload_path, scratch.path()) {
            Ok(outcome) => outcome,
            Err(e) => DistributionOutcome::TotalFailure {
                cause: e.to_string(),
            },
        };

        match &outcome {
            DistributionOutcome::Complete { parts } => {
                tracing::info!("Stored {} in {} parts", file_name, parts)
            }
            DistributionOutcome::PartialFailure { placed, missing } => tracing::warn!(
                "Stored {} partially: {} placed, {} missing",
                file_name,
                placed,
                missing.len()
            ),
            DistributionOutcome::TotalFailure { cause } => {
                tracing::warn!("Upload of {} failed: {}", file_name, cause)
            }
        }

        Ok(outcome)
    }

    /// Everything after the body is on local disk
    fn stage_and_place(
        &self,
        file_name: &str,
        upload_path: &Path,
        scratch: &Path,
    ) -> Result<DistributionOutcome> {
        let parts = partition::split_file(upload_path, file_name, self.config.part_count, scratch)?;
        Ok(self.place_parts(file_name, &parts))
    }

    /// Push parts to their nodes in parallel, then record the placed ones
    ///
    /// The records of a previous upload under the same name are swapped for
    /// the new ones in a single ledger rewrite, and only once at least one new
    /// part has been stored. A total failure leaves the previous version
    /// recorded.
    fn place_parts(&self, file_name: &str, parts: &[PartFile]) -> DistributionOutcome {
        let nodes = &self.config.storage_nodes;

        let transfers: Vec<std::result::Result<StorageServerInfo, MissingReason>> =
            crossbeam::scope(|scope| {
                let handles: Vec<_> = parts
                    .iter()
                    .map(|part| {
                        let node = nodes.get(part.index);
                        scope.spawn(move |_| match node {
                            None => Err(MissingReason::NoStorageNode),
                            Some(node) => self
                                .nodes
                                .store(node, &part.name, &part.path)
                                .map(|_| node.clone())
                                .map_err(|e| MissingReason::TransferFailed(e.to_string())),
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(MissingReason::TransferFailed("transfer thread panicked".into()))
                        })
                    })
                    .collect()
            })
            .unwrap_or_else(|_| {
                parts
                    .iter()
                    .map(|_| Err(MissingReason::TransferFailed("transfer thread panicked".into())))
                    .collect()
            });

        let mut records = Vec::new();
        let mut missing = Vec::new();

        for (part, transfer) in parts.iter().zip(transfers) {
            match transfer {
                Ok(node) => {
                    tracing::debug!("Placed {} on {}", part.name, node);
                    records.push(MappingRecord::new(file_name, part.name.as_str(), node));
                }
                Err(reason) => {
                    tracing::warn!("Part {} not placed: {}", part.name, reason);
                    missing.push(MissingPart {
                        part_name: part.name.clone(),
                        reason,
                    });
                }
            }
        }

        if records.is_empty() {
            return DistributionOutcome::from_placement(0, missing);
        }

        let placed: Vec<String> = records.iter().map(|r| r.part_name.clone()).collect();
        match self.ledger.replace_file(file_name, records) {
            Ok(replaced) => {
                if !replaced.is_empty() {
                    tracing::debug!(
                        "Replaced previous version of {} ({} records)",
                        file_name,
                        replaced.len()
                    );
                }
                DistributionOutcome::from_placement(placed.len(), missing)
            }
            Err(e) => {
                tracing::warn!("Failed to record parts of {}: {}", file_name, e);
                let reason = MissingReason::NotRecorded(e.to_string());
                missing.extend(placed.into_iter().map(|part_name| MissingPart {
                    part_name,
                    reason: reason.clone(),
                }));
                DistributionOutcome::from_placement(0, missing)
            }
        }
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Fetch every part of `file_name` and assemble it
    ///
    /// Fails unless the ledger holds exactly parts `1..=part_count` and every
    /// one of them can be fetched.
    pub fn retrieve(&self, file_name: &str) -> Result<RetrievedFile> {
        names::validate_name(file_name)?;

        let records = self.ledger.records_for(file_name);
        if records.is_empty() {
            return Err(AtlasError::FileNotFound(file_name.to_string()));
        }
        self.check_complete(file_name, &records)?;

        let scratch = ScratchDir::create(&self.scratch_root)?;
        let part_paths = self.fetch_parts(&records, scratch.path())?;

        let assembled = scratch.path().join(Self::ASSEMBLED_FILENAME);
        let length = partition::concatenate(&part_paths, &assembled)?;

        // Open before the rename so a concurrent download of the same name
        // cannot swap the file under this handle
        let file = File::open(&assembled)?;
        let path = self.download_dir.join(file_name);
        fs::rename(&assembled, &path)?;

        tracing::info!(
            "Assembled {} from {} parts ({} bytes)",
            file_name,
            records.len(),
            length
        );

        Ok(RetrievedFile {
            name: file_name.to_string(),
            path,
            file,
            length,
        })
    }

    /// The recorded parts must be exactly indices `0..part_count`
    fn check_complete(&self, file_name: &str, records: &[MappingRecord]) -> Result<()> {
        let expected = self.config.part_count;

        let missing: Vec<String> = (0..expected)
            .filter(|&i| !records.iter().any(|r| r.part_index() == Some(i)))
            .map(|i| names::part_name(file_name, i))
            .collect();

        if !missing.is_empty() {
            return Err(AtlasError::IncompleteFile {
                file: file_name.to_string(),
                missing,
            });
        }

        let unexpected: Vec<&str> = records
            .iter()
            .filter(|r| r.part_index().map_or(true, |i| i >= expected))
            .map(|r| r.part_name.as_str())
            .collect();

        if !unexpected.is_empty() {
            return Err(AtlasError::Ledger(format!(
                "{} has parts outside 1..={}: {}",
                file_name,
                expected,
                unexpected.join(", ")
            )));
        }

        Ok(())
    }

    /// Fetch all parts in parallel into `scratch`, returning their paths in
    /// part order
    fn fetch_parts(&self, records: &[MappingRecord], scratch: &Path) -> Result<Vec<PathBuf>> {
        let results: Vec<Result<PathBuf>> = crossbeam::scope(|scope| {
            let handles: Vec<_> = records
                .iter()
                .map(|record| {
                    scope.spawn(move |_| {
                        let dest = scratch.join(&record.part_name);
                        let unavailable = |reason: String| AtlasError::PartUnavailable {
                            part: record.part_name.clone(),
                            node: record.node.to_string(),
                            reason,
                        };

                        match self.nodes.fetch(&record.node, &record.part_name, &dest) {
                            Ok(FetchOutcome::Found { .. }) => Ok(dest),
                            Ok(FetchOutcome::NotFound) => Err(unavailable("not found".into())),
                            Err(e) => Err(unavailable(e.to_string())),
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(AtlasError::Storage("fetch thread panicked".into()))
                    })
                })
                .collect()
        })
        .map_err(|_| AtlasError::Storage("fetch thread panicked".into()))?;

        results.into_iter().collect()
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete every part of `file_name` from its node, then strike its records
    ///
    /// Node failures are logged and reported in the outcome; the records are
    /// struck regardless.
    pub fn remove_file(&self, file_name: &str) -> Result<RemovalOutcome> {
        let records = self.ledger.records_for(file_name);
        if records.is_empty() {
            return Ok(RemovalOutcome::NotFound);
        }

        let mut node_failures = Vec::new();
        for record in &records {
            match self.nodes.delete(&record.node, &record.part_name) {
                Ok(true) => tracing::debug!("Deleted {} from {}", record.part_name, record.node),
                Ok(false) => {
                    tracing::warn!("{} reported no {} to delete", record.node, record.part_name);
                    node_failures.push(record.part_name.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to delete {} from {}: {}",
                        record.part_name,
                        record.node,
                        e
                    );
                    node_failures.push(record.part_name.clone());
                }
            }
        }

        let removed = self.ledger.remove_file(file_name)?;
        if removed.is_empty() {
            // A concurrent delete struck the records first
            return Ok(RemovalOutcome::NotFound);
        }

        tracing::info!("Deleted {} ({} parts)", file_name, removed.len());

        Ok(RemovalOutcome::Deleted {
            parts: removed.len(),
            node_failures,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn storage_nodes(&self) -> &[StorageServerInfo] {
        &self.config.storage_nodes
    }
}

/// Copy the upload body to `dest`
///
/// Read failures surface as `AtlasError::Io`. A local write failure keeps
/// reading until the body is consumed and then reports `AtlasError::Storage`.
fn receive_upload<R: Read + ?Sized>(reader: &mut R, dest: &Path, length: u64) -> Result<()> {
    let mut writer = match File::create(dest) {
        Ok(file) => Some(BufWriter::new(file)),
        Err(e) => {
            drain(reader, length)?;
            return Err(AtlasError::Storage(format!("cannot stage upload: {}", e)));
        }
    };
    let mut write_error = None;

    let mut buf = vec![0u8; RECEIVE_CHUNK_SIZE];
    let mut remaining = length;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(AtlasError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("upload body ended with {} bytes outstanding", remaining),
                )))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        remaining -= n as u64;

        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.write_all(&buf[..n]) {
                write_error = Some(e);
                writer = None;
            }
        }
    }

    if let Some(mut w) = writer {
        if let Err(e) = w.flush() {
            write_error = Some(e);
        }
    }

    match write_error {
        Some(e) => Err(AtlasError::Storage(format!("cannot stage upload: {}", e))),
        None => Ok(()),
    }
}
