//! Per-operation scratch directories
//!
//! Every upload and download stages its temporary files in a directory
//! owned by a [`ScratchDir`]; dropping the guard removes it, whatever the
//! outcome of the operation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

static NEXT_SCRATCH_ID: AtomicU64 = AtomicU64::new(1);

/// A temporary directory removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh directory under `root`
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;

        let id = NEXT_SCRATCH_ID.fetch_add(1, Ordering::Relaxed);
        let path = root.join(format!("op-{}-{}", std::process::id(), id));

        // Leftover from an earlier process that reused this pid
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir(&path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
